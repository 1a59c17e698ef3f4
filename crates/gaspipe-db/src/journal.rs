//! Run journal: one row per orchestrator invocation.
//!
//! Lifecycle is RUNNING → SUCCESS | FAILED, with exactly one terminal
//! transition per run. A run whose process died mid-flight stays RUNNING and
//! is recognizable by `finished_at IS NULL`.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "RUNNING" => Ok(RunStatus::Running),
            "SUCCESS" => Ok(RunStatus::Success),
            "FAILED" => Ok(RunStatus::Failed),
            other => Err(anyhow!("invalid run status: {}", other)),
        }
    }
}

/// Row counters carried through the lifecycle and stamped at close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub rows_fetched: i64,
    pub rows_inserted: i64,
    pub rows_deleted: i64,
}

/// Open a run: insert a RUNNING row with a fresh run id. Returns the id.
pub async fn open_run(pool: &PgPool, dataset_id: &str) -> Result<Uuid> {
    let run_id = Uuid::new_v4();
    let started = Utc::now();

    sqlx::query(
        r#"
        insert into ingestion_runs (run_id, dataset_id, started_at, status, created_at)
        values ($1, $2, $3, 'RUNNING', $3)
        "#,
    )
    .bind(run_id)
    .bind(dataset_id)
    .bind(started)
    .execute(pool)
    .await
    .context("open_run insert failed")?;

    Ok(run_id)
}

/// Close a run with a terminal status, final counters, and optional error.
pub async fn close_run(
    pool: &PgPool,
    run_id: Uuid,
    status: RunStatus,
    counters: &RunCounters,
    error_message: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        update ingestion_runs
        set finished_at = $2,
            status = $3,
            rows_fetched = $4,
            rows_inserted = $5,
            rows_deleted = $6,
            error_message = $7
        where run_id = $1
        "#,
    )
    .bind(run_id)
    .bind(Utc::now())
    .bind(status.as_str())
    .bind(counters.rows_fetched)
    .bind(counters.rows_inserted)
    .bind(counters.rows_deleted)
    .bind(error_message)
    .execute(pool)
    .await
    .context("close_run update failed")?;

    Ok(())
}

#[derive(Debug, Clone)]
pub struct IngestionRun {
    pub run_id: Uuid,
    pub dataset_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub rows_fetched: i64,
    pub rows_inserted: i64,
    pub rows_deleted: i64,
    pub error_message: Option<String>,
}

pub async fn fetch_run(pool: &PgPool, run_id: Uuid) -> Result<IngestionRun> {
    let row = sqlx::query(
        r#"
        select run_id, dataset_id, started_at, finished_at, status,
               rows_fetched, rows_inserted, rows_deleted, error_message
        from ingestion_runs
        where run_id = $1
        "#,
    )
    .bind(run_id)
    .fetch_one(pool)
    .await
    .context("fetch_run failed")?;

    Ok(IngestionRun {
        run_id: row.try_get("run_id")?,
        dataset_id: row.try_get("dataset_id")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        status: RunStatus::parse(&row.try_get::<String, _>("status")?)?,
        rows_fetched: row.try_get("rows_fetched")?,
        rows_inserted: row.try_get("rows_inserted")?,
        rows_deleted: row.try_get("rows_deleted")?,
        error_message: row.try_get("error_message")?,
    })
}
