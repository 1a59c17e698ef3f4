//! gaspipe-db
//!
//! All persistence for the ingestion engine: pool construction, the run
//! journal, the raw store, field discovery, the flat series catalog, the
//! observation upserter, the retention delete policy, and the relational GIE
//! backend.
//!
//! Adapters never touch this crate; the orchestrator is the only caller.

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

pub mod discovery;
pub mod gie;
pub mod journal;
pub mod observations;
pub mod raw;
pub mod retention;
pub mod series;

pub use discovery::{discover_fields, list_datasets};
pub use gie::{
    delete_gie_by_source, get_or_create_asset, get_or_create_series, insert_gie_rows,
    GIE_DELETE_LOOKBACK_DAYS,
};
pub use journal::{close_run, fetch_run, open_run, IngestionRun, RunCounters, RunStatus};
pub use observations::upsert_observations;
pub use raw::{insert_raw_document, insert_raw_rows};
pub use retention::{apply_delete_policy, RetentionConfig};
pub use series::register_series;

/// Direct connection-URL override, used by integration tests and CI.
/// When unset, the pool is built from the `POSTGRES_*` settings.
pub const ENV_DB_URL: &str = "GASPIPE_DATABASE_URL";

/// Connect to Postgres.
///
/// `GASPIPE_DATABASE_URL` wins when present; otherwise the URL is assembled
/// from `gaspipe-config` settings.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = match std::env::var(ENV_DB_URL) {
        Ok(url) => url,
        Err(_) => gaspipe_config::Settings::from_env()?.database_url(),
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Test helper used by integration tests:
/// - Connect using GASPIPE_DATABASE_URL
/// - Ensure migrations are applied
pub async fn testkit_db_pool() -> Result<PgPool> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Run embedded SQLx migrations (test/dev bootstrap; production schemas are
/// provisioned out of band).
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'ingestion_runs'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok,
        has_ingestion_runs_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_ingestion_runs_table: bool,
}
