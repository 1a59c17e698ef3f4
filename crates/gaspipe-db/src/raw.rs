//! Raw store: verbatim upstream payloads with provenance.
//!
//! Append-only. Tabular batches land one row per source row; GIE documents
//! land whole. Payload values arrive already NaN-scrubbed (serde_json cannot
//! represent non-finite numbers; see `gaspipe_model::json_number`).

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use gaspipe_model::JsonMap;

/// Insert one raw-event row per source row. Returns the inserted count.
///
/// `series_hint` is lifted from a `"Data Item"` key when the row carries one.
pub async fn insert_raw_rows(
    pool: &PgPool,
    dataset_id: &str,
    source: &str,
    rows: &[JsonMap],
    run_id: Option<Uuid>,
) -> Result<u64> {
    if rows.is_empty() {
        warn!(dataset_id, "no raw rows to ingest");
        return Ok(0);
    }

    let ingested_at = Utc::now();
    for row in rows {
        let series_hint = row.get("Data Item").and_then(Value::as_str);
        sqlx::query(
            r#"
            insert into raw_events
                (source, dataset_id, series_hint, event_time, raw_payload, ingested_at, ingestion_run_id)
            values ($1, $2, $3, null, $4, $5, $6)
            "#,
        )
        .bind(source)
        .bind(dataset_id)
        .bind(series_hint)
        .bind(Value::Object(row.clone()))
        .bind(ingested_at)
        .bind(run_id)
        .execute(pool)
        .await
        .context("raw_events insert failed")?;
    }

    info!(dataset_id, rows = rows.len(), "raw-ingested rows");
    Ok(rows.len() as u64)
}

/// Store one whole JSON document (e.g. a GIE API response) as a single
/// raw-event row.
pub async fn insert_raw_document(
    pool: &PgPool,
    dataset_id: &str,
    source: &str,
    payload: &Value,
    run_id: Option<Uuid>,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into raw_events
            (source, dataset_id, series_hint, event_time, raw_payload, ingested_at, ingestion_run_id)
        values ($1, $2, null, null, $3, $4, $5)
        "#,
    )
    .bind(source)
    .bind(dataset_id)
    .bind(payload)
    .bind(Utc::now())
    .bind(run_id)
    .execute(pool)
    .await
    .context("raw_events document insert failed")?;

    info!(dataset_id, "raw-ingested 1 JSON document");
    Ok(())
}
