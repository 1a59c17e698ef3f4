//! Retention delete policy, config-driven.
//!
//! The orchestrator applies this after normalization and before insert so the
//! deleted window is exactly the one the subsequent upsert repopulates
//! (rolling-window idempotence).

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{info, warn};

/// Per-dataset retention rules. Absent strategy means no deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Strategy selector; only `last_n_days` is currently implemented.
    pub delete_strategy: Option<String>,
    pub delete_window_days: Option<i64>,
}

/// Apply the delete policy for a dataset. Returns rows deleted.
///
/// `last_n_days` deletes observations older than `now_utc - window` for
/// series belonging to this dataset. Any other (or missing) strategy is a
/// no-op.
pub async fn apply_delete_policy(
    pool: &PgPool,
    dataset_id: &str,
    time_field: &str,
    config: &RetentionConfig,
) -> Result<i64> {
    let window = match (&config.delete_strategy, config.delete_window_days) {
        (Some(strategy), Some(days)) if strategy == "last_n_days" && days > 0 => days,
        _ => return Ok(0),
    };

    let cutoff = Utc::now() - Duration::days(window);

    // data_observations is keyed on observation_time; adapters declaring a
    // different time field still prune on that column.
    if time_field != "observation_time" {
        warn!(time_field, "delete policy prunes on observation_time");
    }

    let result = sqlx::query(
        r#"
        with series_to_delete as (
            select series_id from meta_series where dataset_id = $1
        )
        delete from data_observations
        where series_id in (select series_id from series_to_delete)
          and observation_time < $2
        "#,
    )
    .bind(dataset_id)
    .bind(cutoff)
    .execute(pool)
    .await
    .context("delete policy failed")?;

    let rows_deleted = result.rows_affected() as i64;
    info!(
        dataset_id,
        strategy = "last_n_days",
        window_days = window,
        deleted = rows_deleted,
        "delete policy applied"
    );
    Ok(rows_deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_inert() {
        let cfg = RetentionConfig::default();
        assert!(cfg.delete_strategy.is_none());
        assert!(cfg.delete_window_days.is_none());
    }
}
