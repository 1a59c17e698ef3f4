// Run journal lifecycle: RUNNING on open, exactly one terminal transition,
// counters and error stamped at close.
//
// DB-backed test, skipped if GASPIPE_DATABASE_URL is not set.

use anyhow::Result;
use gaspipe_db::{RunCounters, RunStatus};

#[tokio::test]
async fn run_opens_running_and_closes_success() -> Result<()> {
    if std::env::var(gaspipe_db::ENV_DB_URL).is_err() {
        eprintln!("SKIP: GASPIPE_DATABASE_URL not set");
        return Ok(());
    }
    let pool = gaspipe_db::testkit_db_pool().await?;

    let run_id = gaspipe_db::open_run(&pool, "JOURNAL_TEST").await?;

    let open = gaspipe_db::fetch_run(&pool, run_id).await?;
    assert_eq!(open.status, RunStatus::Running);
    assert!(open.finished_at.is_none(), "crashed-run marker is the null finished_at");
    assert_eq!(open.dataset_id, "JOURNAL_TEST");

    let counters = RunCounters {
        rows_fetched: 12,
        rows_inserted: 30,
        rows_deleted: 4,
    };
    gaspipe_db::close_run(&pool, run_id, RunStatus::Success, &counters, None).await?;

    let closed = gaspipe_db::fetch_run(&pool, run_id).await?;
    assert_eq!(closed.status, RunStatus::Success);
    let finished = closed.finished_at.expect("terminal run has finished_at");
    assert!(finished >= closed.started_at);
    assert_eq!(closed.rows_fetched, 12);
    assert_eq!(closed.rows_inserted, 30);
    assert_eq!(closed.rows_deleted, 4);
    assert!(closed.error_message.is_none());

    Ok(())
}

#[tokio::test]
async fn failed_close_records_the_error() -> Result<()> {
    if std::env::var(gaspipe_db::ENV_DB_URL).is_err() {
        eprintln!("SKIP: GASPIPE_DATABASE_URL not set");
        return Ok(());
    }
    let pool = gaspipe_db::testkit_db_pool().await?;

    let run_id = gaspipe_db::open_run(&pool, "JOURNAL_TEST").await?;
    gaspipe_db::close_run(
        &pool,
        run_id,
        RunStatus::Failed,
        &RunCounters::default(),
        Some("upstream api error status=503: down"),
    )
    .await?;

    let closed = gaspipe_db::fetch_run(&pool, run_id).await?;
    assert_eq!(closed.status, RunStatus::Failed);
    assert_eq!(
        closed.error_message.as_deref(),
        Some("upstream api error status=503: down")
    );

    Ok(())
}

#[tokio::test]
async fn concurrent_runs_get_independent_ids() -> Result<()> {
    if std::env::var(gaspipe_db::ENV_DB_URL).is_err() {
        eprintln!("SKIP: GASPIPE_DATABASE_URL not set");
        return Ok(());
    }
    let pool = gaspipe_db::testkit_db_pool().await?;

    let first = gaspipe_db::open_run(&pool, "JOURNAL_TEST").await?;
    let second = gaspipe_db::open_run(&pool, "JOURNAL_TEST").await?;
    assert_ne!(first, second);

    gaspipe_db::close_run(&pool, first, RunStatus::Success, &RunCounters::default(), None).await?;
    gaspipe_db::close_run(&pool, second, RunStatus::Success, &RunCounters::default(), None)
        .await?;

    Ok(())
}
