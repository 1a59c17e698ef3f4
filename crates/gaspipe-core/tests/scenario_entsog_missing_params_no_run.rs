// ENTSOG without indicators or point+direction is a configuration error:
// it surfaces synchronously and no journal row is opened.
//
// DB-backed test, skipped if GASPIPE_DATABASE_URL is not set.

use anyhow::Result;

use gaspipe_adapters::EntsogAdapter;
use gaspipe_core::{AdapterRegistry, Orchestrator};
use gaspipe_model::FetchParams;

#[tokio::test]
async fn missing_selectors_fail_before_any_side_effect() -> Result<()> {
    if std::env::var(gaspipe_db::ENV_DB_URL).is_err() {
        eprintln!("SKIP: GASPIPE_DATABASE_URL not set");
        return Ok(());
    }
    let pool = gaspipe_db::testkit_db_pool().await?;

    let (runs_before,): (i64,) =
        sqlx::query_as("select count(*)::bigint from ingestion_runs where dataset_id = 'ENTSOG'")
            .fetch_one(&pool)
            .await?;

    let mut registry = AdapterRegistry::new();
    registry.register("ENTSOG", || Box::new(EntsogAdapter::new()));
    let orchestrator = Orchestrator::new(pool.clone(), registry);

    let params = FetchParams {
        operator_keys: vec!["X".to_string()],
        ..Default::default()
    };
    let err = orchestrator.run("ENTSOG", params).await.unwrap_err();
    assert!(err.to_string().contains("config error"));
    assert!(format!("{err:#}").contains("pointKey + directionKey"));

    let (runs_after,): (i64,) =
        sqlx::query_as("select count(*)::bigint from ingestion_runs where dataset_id = 'ENTSOG'")
            .fetch_one(&pool)
            .await?;
    assert_eq!(runs_before, runs_after, "no run journal row was opened");

    Ok(())
}
