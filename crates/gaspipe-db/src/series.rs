//! Flat series catalog (`meta_series`).
//!
//! Series metadata is write-once: insert `on conflict do nothing`, so
//! concurrent runs producing the same series id reconcile commutatively and
//! attributes never change after first registration.

use anyhow::{Context, Result};
use sqlx::PgPool;

use gaspipe_model::SeriesMeta;

/// Idempotently insert canonical series metadata. Returns how many rows were
/// actually inserted (conflicts are skipped).
pub async fn register_series(pool: &PgPool, series: &[SeriesMeta]) -> Result<u64> {
    let mut inserted = 0u64;

    for meta in series {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            insert into meta_series
                (series_id, source, dataset_id, data_item, description,
                 unit, frequency, timezone_source, is_active)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            on conflict (series_id) do nothing
            returning series_id
            "#,
        )
        .bind(&meta.series_id)
        .bind(&meta.source)
        .bind(&meta.dataset_id)
        .bind(&meta.data_item)
        .bind(&meta.description)
        .bind(&meta.unit)
        .bind(&meta.frequency)
        .bind(&meta.timezone_source)
        .bind(meta.is_active)
        .fetch_optional(pool)
        .await
        .context("meta_series insert failed")?;

        if row.is_some() {
            inserted += 1;
        }
    }

    Ok(inserted)
}
