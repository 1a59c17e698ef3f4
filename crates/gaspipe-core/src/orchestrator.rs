//! Strict ingestion lifecycle. Order must never change; adapters cannot
//! alter it.
//!
//! Per invocation: resolve adapter → check params → open run → load config →
//! fetch (retried) → persist raw + field discovery → parse → normalize →
//! validate → delete policy → register series → insert observations →
//! finalize → metrics. Any failure after the run opens routes to the failure
//! tail, which closes the run FAILED with best-effort counters and re-raises.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use gaspipe_adapters::{DatasetAdapter, ValidationConfig};
use gaspipe_db::{journal, RetentionConfig, RunCounters, RunStatus};
use gaspipe_model::{
    gie_source, FetchParams, GieRecord, JsonMap, Normalized, ObservationRecord, RawPayload,
};

use crate::registry::AdapterRegistry;
use crate::validation;

const FETCH_MAX_ATTEMPTS: u32 = 3;

/// Per-dataset configuration: retention rules plus validator overrides.
/// Absent config yields the empty default.
#[derive(Debug, Clone, Default)]
pub struct DatasetConfig {
    pub retention: RetentionConfig,
    pub validation: Option<ValidationConfig>,
}

/// Summary returned to the caller; the journal row is the durable record.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub dataset_id: String,
    pub rows_fetched: i64,
    pub rows_inserted: i64,
    pub rows_deleted: i64,
}

/// Enforces the ingestion lifecycle. Adapters only provide
/// fetch/parse/normalize/define_series/time_field.
pub struct Orchestrator {
    pool: PgPool,
    registry: AdapterRegistry,
    configs: HashMap<String, DatasetConfig>,
}

impl Orchestrator {
    pub fn new(pool: PgPool, registry: AdapterRegistry) -> Self {
        Self {
            pool,
            registry,
            configs: HashMap::new(),
        }
    }

    /// Attach a per-dataset config (retention window, validator overrides).
    pub fn with_dataset_config(mut self, dataset_id: &str, config: DatasetConfig) -> Self {
        self.configs.insert(dataset_id.to_string(), config);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run one ingestion for a dataset.
    ///
    /// Configuration errors (unknown dataset, bad parameters, missing API
    /// key) surface before a run is opened. Everything after the journal
    /// opens is recorded there, success or failure.
    pub async fn run(&self, dataset_id: &str, params: FetchParams) -> Result<RunOutcome> {
        // 1. Resolve the adapter; unknown ids fail synchronously.
        let factory = self
            .registry
            .get(dataset_id)
            .ok_or_else(|| anyhow!("no adapter registered for dataset_id={dataset_id:?}"))?;
        let adapter = factory();

        // Parameter problems are configuration errors: no run is opened.
        adapter
            .validate_params(&params)
            .map_err(anyhow::Error::new)?;

        // 2. Open the journal entry.
        let run_id = journal::open_run(&self.pool, dataset_id).await?;
        info!(dataset_id, %run_id, "ingestion run opened");

        let mut counters = RunCounters::default();
        match self
            .execute(dataset_id, adapter.as_ref(), &params, run_id, &mut counters)
            .await
        {
            Ok(()) => {
                // 11. Finalize.
                journal::close_run(&self.pool, run_id, RunStatus::Success, &counters, None)
                    .await?;
                // 12. Metrics.
                self.emit_metrics(dataset_id, run_id, &counters);
                Ok(RunOutcome {
                    run_id,
                    dataset_id: dataset_id.to_string(),
                    rows_fetched: counters.rows_fetched,
                    rows_inserted: counters.rows_inserted,
                    rows_deleted: counters.rows_deleted,
                })
            }
            Err(err) => {
                let message = format!("{err:#}");
                if let Err(close_err) = journal::close_run(
                    &self.pool,
                    run_id,
                    RunStatus::Failed,
                    &counters,
                    Some(&message),
                )
                .await
                {
                    warn!(%run_id, error = %close_err, "failed to finalize failed run");
                }
                Err(err)
            }
        }
    }

    /// Steps 3–10; counters are written in place so the failure tail can
    /// stamp whatever was measured before the error.
    async fn execute(
        &self,
        dataset_id: &str,
        adapter: &dyn DatasetAdapter,
        params: &FetchParams,
        run_id: Uuid,
        counters: &mut RunCounters,
    ) -> Result<()> {
        // 3. Load dataset config; absent config is the empty default.
        let config = self.configs.get(dataset_id).cloned().unwrap_or_default();

        // 4. Fetch, with orchestrator-owned retry.
        let raw = fetch_with_retry(adapter, params).await?;

        // 5. Persist raw, then discover fields over this dataset's events.
        self.store_raw_payload(dataset_id, adapter, &raw, run_id)
            .await?;

        // 6. Parse.
        let records = adapter.parse(&raw).map_err(anyhow::Error::new)?;
        counters.rows_fetched = records.len() as i64;

        // 7. Normalize; one record may expand to many observations.
        let normalized = normalize_all(adapter, &records);
        counters.rows_inserted = normalized.len() as i64;

        // 8. Validate; a violation is terminal.
        validation::validate(&normalized, adapter, config.validation.as_ref())
            .map_err(anyhow::Error::new)?;

        // 9. Delete policy, before insert so the pruned window is the one
        //    the upsert repopulates.
        counters.rows_deleted = self
            .apply_delete_policy(dataset_id, adapter, &config)
            .await?;

        // 10a. Register canonical series (flat variant only; GIE creates
        //      series inline at insert).
        let series_meta = adapter.define_series(&normalized);
        if gie_source(dataset_id).is_none() {
            gaspipe_db::register_series(&self.pool, &series_meta).await?;
        }

        // 10b. Insert observations.
        self.insert_observations(dataset_id, &normalized, run_id)
            .await?;

        Ok(())
    }

    async fn store_raw_payload(
        &self,
        dataset_id: &str,
        adapter: &dyn DatasetAdapter,
        raw: &RawPayload,
        run_id: Uuid,
    ) -> Result<()> {
        match raw {
            RawPayload::Rows(rows) if !rows.is_empty() => {
                gaspipe_db::insert_raw_rows(
                    &self.pool,
                    dataset_id,
                    adapter.source(),
                    rows,
                    Some(run_id),
                )
                .await?;
                gaspipe_db::discover_fields(&self.pool, dataset_id).await?;
            }
            RawPayload::Document(doc) if gie_source(dataset_id).is_some() => {
                gaspipe_db::insert_raw_document(
                    &self.pool,
                    dataset_id,
                    adapter.source(),
                    doc,
                    Some(run_id),
                )
                .await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn apply_delete_policy(
        &self,
        dataset_id: &str,
        adapter: &dyn DatasetAdapter,
        config: &DatasetConfig,
    ) -> Result<i64> {
        if let Some(source) = gie_source(dataset_id) {
            let lookback = config
                .retention
                .delete_window_days
                .unwrap_or(gaspipe_db::GIE_DELETE_LOOKBACK_DAYS);
            return gaspipe_db::delete_gie_by_source(&self.pool, source, lookback).await;
        }
        gaspipe_db::apply_delete_policy(
            &self.pool,
            dataset_id,
            adapter.time_field(),
            &config.retention,
        )
        .await
    }

    async fn insert_observations(
        &self,
        dataset_id: &str,
        normalized: &[Normalized],
        run_id: Uuid,
    ) -> Result<()> {
        if normalized.is_empty() {
            return Ok(());
        }

        if let Some(source) = gie_source(dataset_id) {
            let rows: Vec<GieRecord> = normalized
                .iter()
                .filter_map(|n| match n {
                    Normalized::GieDaily(r) => Some(r.clone()),
                    _ => None,
                })
                .collect();
            gaspipe_db::insert_gie_rows(&self.pool, source, &rows).await?;
        } else {
            let rows: Vec<ObservationRecord> = normalized
                .iter()
                .filter_map(|n| match n {
                    Normalized::Observation(o) => Some(o.clone()),
                    _ => None,
                })
                .collect();
            gaspipe_db::upsert_observations(&self.pool, &rows, Some(run_id)).await?;
        }
        Ok(())
    }

    fn emit_metrics(&self, dataset_id: &str, run_id: Uuid, counters: &RunCounters) {
        info!(
            dataset_id,
            %run_id,
            rows_fetched = counters.rows_fetched,
            rows_inserted = counters.rows_inserted,
            rows_deleted = counters.rows_deleted,
            "ingestion run succeeded"
        );
    }
}

/// Centralized retry for fetch (orchestrator-owned, never the adapter's):
/// up to 3 attempts with 1 s, 2 s, 4 s backoff. The last failure aborts the
/// run.
async fn fetch_with_retry(
    adapter: &dyn DatasetAdapter,
    params: &FetchParams,
) -> Result<RawPayload> {
    let mut attempt = 1u32;
    let mut backoff = Duration::from_secs(1);

    loop {
        match adapter.fetch(params).await {
            Ok(raw) => return Ok(raw),
            Err(err) if attempt < FETCH_MAX_ATTEMPTS => {
                warn!(
                    attempt,
                    max_attempts = FETCH_MAX_ATTEMPTS,
                    dataset_id = adapter.dataset_id(),
                    error = %err,
                    "fetch attempt failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("fetch failed after {FETCH_MAX_ATTEMPTS} attempts")));
            }
        }
    }
}

/// Normalize all records via the adapter, flattening the per-record lists.
fn normalize_all(adapter: &dyn DatasetAdapter, records: &[JsonMap]) -> Vec<Normalized> {
    let mut normalized = Vec::new();
    for record in records {
        normalized.extend(adapter.normalize(record));
    }
    normalized
}

// ---------------------------------------------------------------------------
// Tests (pure pieces; lifecycle scenarios live in tests/)
// ---------------------------------------------------------------------------
