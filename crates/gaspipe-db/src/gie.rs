//! Relational GIE backend: `meta.assets`, `meta.series`, `energy.daily`.
//!
//! GIE series are keyed by (asset, variable, source) and created inline
//! during insert; the rolling-window delete beforehand is the idempotence
//! mechanism (no upsert on `energy.daily`).

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::info;

use gaspipe_model::GieRecord;

/// Default rolling-window lookback for GIE sources.
pub const GIE_DELETE_LOOKBACK_DAYS: i64 = 10;

/// Delete the recent window for a GIE source: `energy.daily` rows joined to
/// series with this source and `value_date >= cutoff`. The subsequent insert
/// repopulates the same range. Returns rows deleted.
pub async fn delete_gie_by_source(
    pool: &PgPool,
    source: &str,
    lookback_days: i64,
) -> Result<i64> {
    let cutoff = (Utc::now() - Duration::days(lookback_days)).date_naive();

    let result = sqlx::query(
        r#"
        delete from energy.daily d
        using meta.series s
        where d.series_id = s.series_id
          and s.source = $1
          and d.value_date >= $2
        "#,
    )
    .bind(source)
    .bind(cutoff)
    .execute(pool)
    .await
    .context("gie window delete failed")?;

    let rows_deleted = result.rows_affected() as i64;
    info!(source, lookback_days, deleted = rows_deleted, "gie window delete");
    Ok(rows_deleted)
}

/// Insert normalized GIE rows into `energy.daily`, creating assets and series
/// on first sight. Returns the inserted row count.
pub async fn insert_gie_rows(pool: &PgPool, source: &str, rows: &[GieRecord]) -> Result<u64> {
    // Per-batch caches so repeated countries/variables resolve once.
    let mut asset_ids: HashMap<String, i64> = HashMap::new();
    let mut series_ids: HashMap<String, i64> = HashMap::new();

    for row in rows {
        let asset_id = match asset_ids.get(&row.country) {
            Some(id) => *id,
            None => {
                let id =
                    get_or_create_asset(pool, &row.country, "Country", row.quality.as_deref())
                        .await?;
                asset_ids.insert(row.country.clone(), id);
                id
            }
        };

        let unique_key = format!("{asset_id}_{}_{source}", row.variable);
        let series_id = match series_ids.get(&unique_key) {
            Some(id) => *id,
            None => {
                let id = get_or_create_series(pool, asset_id, &row.variable, source).await?;
                series_ids.insert(unique_key, id);
                id
            }
        };

        sqlx::query(
            r#"
            insert into energy.daily (value_date, value, series_id, asset_id)
            values ($1, $2, $3, $4)
            "#,
        )
        .bind(row.date)
        .bind(row.value)
        .bind(series_id)
        .bind(asset_id)
        .execute(pool)
        .await
        .context("energy.daily insert failed")?;
    }

    info!(source, rows = rows.len(), "inserted gie rows");
    Ok(rows.len() as u64)
}

/// Resolve an asset by name, creating it on first sight.
pub async fn get_or_create_asset(
    pool: &PgPool,
    name: &str,
    level: &str,
    quality: Option<&str>,
) -> Result<i64> {
    let existing = sqlx::query(
        r#"
        select asset_id from meta.assets where name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await
    .context("asset lookup failed")?;

    if let Some(row) = existing {
        return Ok(row.try_get("asset_id")?);
    }

    let row = sqlx::query(
        r#"
        insert into meta.assets (name, type, level, quality)
        values ($1, 'Storage', $2, $3)
        on conflict (name) do update set name = excluded.name
        returning asset_id
        "#,
    )
    .bind(name)
    .bind(level)
    .bind(quality)
    .fetch_one(pool)
    .await
    .context("asset insert failed")?;

    Ok(row.try_get("asset_id")?)
}

/// Resolve a series by its `(asset, variable, source)` key, creating it on
/// first sight.
pub async fn get_or_create_series(
    pool: &PgPool,
    asset_id: i64,
    variable: &str,
    source: &str,
) -> Result<i64> {
    let unique_key = format!("{asset_id}_{variable}_{source}");

    let existing = sqlx::query(
        r#"
        select series_id from meta.series where series_unique_concat = $1
        "#,
    )
    .bind(&unique_key)
    .fetch_optional(pool)
    .await
    .context("series lookup failed")?;

    if let Some(row) = existing {
        return Ok(row.try_get("series_id")?);
    }

    let row = sqlx::query(
        r#"
        insert into meta.series
            (series_name, asset_id, series_unique_concat, variable, source)
        values ($1, $2, $3, $4, $5)
        on conflict (series_unique_concat) do update
            set series_unique_concat = excluded.series_unique_concat
        returning series_id
        "#,
    )
    .bind(format!("{variable}_{asset_id}"))
    .bind(asset_id)
    .bind(&unique_key)
    .bind(variable)
    .bind(source)
    .fetch_one(pool)
    .await
    .context("series insert failed")?;

    Ok(row.try_get("series_id")?)
}
