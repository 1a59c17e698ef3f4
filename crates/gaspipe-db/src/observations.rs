//! Observation upserter (flat variant).
//!
//! Batch-level dedup happens before any SQL: within a batch, the last record
//! for a `(series_id, observation_time)` key wins. Each surviving record is
//! then upserted, overwriting value, quality, raw payload, ingestion time and
//! run id on conflict. Re-running the same ingestion with identical data
//! converges to the same table state.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use gaspipe_model::ObservationRecord;

/// Dedup then upsert a batch of observations. Returns the deduped row count.
pub async fn upsert_observations(
    pool: &PgPool,
    records: &[ObservationRecord],
    run_id: Option<Uuid>,
) -> Result<u64> {
    if records.is_empty() {
        warn!("no observation records to insert");
        return Ok(0);
    }

    // Last write wins within the batch; BTreeMap keeps SQL order deterministic.
    let mut unique: BTreeMap<(String, DateTime<Utc>), &ObservationRecord> = BTreeMap::new();
    for record in records {
        unique.insert(
            (record.series_id.clone(), record.observation_time),
            record,
        );
    }

    let ingestion_time = Utc::now();
    for record in unique.values() {
        sqlx::query(
            r#"
            insert into data_observations
                (series_id, observation_time, value, quality_flag, raw_payload,
                 ingestion_time, ingestion_run_id)
            values ($1, $2, $3, $4, $5, $6, $7)
            on conflict (series_id, observation_time) do update
                set value            = excluded.value,
                    ingestion_time   = excluded.ingestion_time,
                    quality_flag     = excluded.quality_flag,
                    raw_payload      = excluded.raw_payload,
                    ingestion_run_id = excluded.ingestion_run_id
            "#,
        )
        .bind(&record.series_id)
        .bind(record.observation_time)
        .bind(record.value)
        .bind(&record.quality_flag)
        .bind(&record.raw_payload)
        .bind(ingestion_time)
        .bind(run_id)
        .execute(pool)
        .await
        .context("data_observations upsert failed")?;
    }

    info!(rows = unique.len(), "upserted observations");
    Ok(unique.len() as u64)
}
