//! Bounded run pool.
//!
//! Callers (HTTP handlers, schedulers) fire runs as independent background
//! tasks; upstream rate limits make unbounded concurrency per dataset unsafe,
//! so each dataset id gets a single in-flight slot. Different datasets
//! proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use gaspipe_model::FetchParams;

use crate::orchestrator::{Orchestrator, RunOutcome};

pub struct IngestPool {
    orchestrator: Arc<Orchestrator>,
    slots: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl IngestPool {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, dataset_id: &str) -> Arc<Semaphore> {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots
            .entry(dataset_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    /// Spawn a run as a background task. Queued behind any in-flight run for
    /// the same dataset; runs to completion even if the handle is dropped.
    pub fn spawn(&self, dataset_id: String, params: FetchParams) -> JoinHandle<Result<RunOutcome>> {
        let orchestrator = self.orchestrator.clone();
        let slot = self.slot(&dataset_id);

        tokio::spawn(async move {
            let _permit = slot
                .acquire_owned()
                .await
                .map_err(|_| anyhow!("ingest slot closed"))?;
            orchestrator.run(&dataset_id, params).await
        })
    }
}
