//! Adapter registry: maps dataset id → adapter factory.
//!
//! Adapters are stateless; the orchestrator instantiates one per run via the
//! factory. Registration happens at startup, lookup at steady state; no
//! further locking is required. No DB, no lifecycle — only registration and
//! lookup.

use std::collections::HashMap;

use gaspipe_adapters::{
    DatasetAdapter, EntsogAdapter, GasPublicationsAdapter, GasQualityAdapter, GieStorageAdapter,
    InstantaneousFlowAdapter,
};
use gaspipe_config::Settings;

pub type AdapterFactory = Box<dyn Fn() -> Box<dyn DatasetAdapter> + Send + Sync>;

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter factory for a dataset id. Later registrations
    /// replace earlier ones.
    pub fn register<F>(&mut self, dataset_id: &str, factory: F)
    where
        F: Fn() -> Box<dyn DatasetAdapter> + Send + Sync + 'static,
    {
        self.adapters.insert(dataset_id.to_string(), Box::new(factory));
    }

    /// Factory for a dataset id, if registered. The caller instantiates.
    pub fn get(&self, dataset_id: &str) -> Option<&AdapterFactory> {
        self.adapters.get(dataset_id)
    }

    /// All registered dataset ids, sorted.
    pub fn list_datasets(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.adapters.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// The production wiring: all six dataset adapters.
pub fn default_registry(settings: &Settings) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();

    registry.register("GAS_QUALITY", || Box::new(GasQualityAdapter::new()));
    registry.register("ENTSOG", || Box::new(EntsogAdapter::new()));
    registry.register("INSTANTANEOUS_FLOW", || {
        Box::new(InstantaneousFlowAdapter::new())
    });
    registry.register("GAS_PUBLICATIONS", || {
        Box::new(GasPublicationsAdapter::new())
    });

    let agsi_key = settings.gie_api_key.clone();
    registry.register("AGSI", move || {
        Box::new(GieStorageAdapter::agsi(agsi_key.clone()))
    });
    let alsi_key = settings.gie_api_key.clone();
    registry.register("ALSI", move || {
        Box::new(GieStorageAdapter::alsi(alsi_key.clone()))
    });

    registry
}
