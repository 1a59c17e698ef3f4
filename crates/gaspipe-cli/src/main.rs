//! gaspipe CLI: trigger ingestion runs and inspect the store.
//!
//! The ingestion engine itself is caller-agnostic; this binary is the
//! operator's entry point.

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gaspipe_core::{default_registry, Orchestrator};
use gaspipe_model::FetchParams;

#[derive(Parser)]
#[command(name = "gaspipe")]
#[command(about = "European gas-market time-series ingestion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// List dataset ids seen in the raw store
    Datasets,

    /// Run one ingestion for a dataset
    Ingest {
        /// Dataset id (GAS_QUALITY | ENTSOG | INSTANTANEOUS_FLOW |
        /// GAS_PUBLICATIONS | AGSI | ALSI)
        dataset_id: String,

        /// Inclusive start date, YYYY-MM-DD
        #[arg(long)]
        from_date: Option<String>,

        /// Inclusive end date, YYYY-MM-DD
        #[arg(long)]
        to_date: Option<String>,

        /// Fill from_date/to_date as (today - N days) .. today when the
        /// explicit dates are omitted
        #[arg(long)]
        last_days: Option<i64>,

        /// Site filter (GAS_QUALITY); repeatable
        #[arg(long = "site-id")]
        site_ids: Vec<i64>,

        /// ENTSOG operator key; repeatable
        #[arg(long = "operator-key")]
        operator_keys: Vec<String>,

        /// ENTSOG point key; repeatable
        #[arg(long = "point-key")]
        point_keys: Vec<String>,

        /// ENTSOG direction key; repeatable
        #[arg(long = "direction-key")]
        direction_keys: Vec<String>,

        /// ENTSOG indicator; repeatable
        #[arg(long = "indicator")]
        indicators: Vec<String>,

        /// ENTSOG result limit
        #[arg(long)]
        limit: Option<i64>,

        /// Publication id (GAS_PUBLICATIONS); repeatable
        #[arg(long = "publication-id")]
        publication_ids: Vec<String>,

        /// Country filter (AGSI/ALSI)
        #[arg(long)]
        country: Option<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = gaspipe_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = gaspipe_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_ingestion_runs_table={}",
                        s.ok, s.has_ingestion_runs_table
                    );
                }
                DbCmd::Migrate => {
                    gaspipe_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::Datasets => {
            let pool = gaspipe_db::connect_from_env().await?;
            for dataset_id in gaspipe_db::list_datasets(&pool).await? {
                println!("{dataset_id}");
            }
        }

        Commands::Ingest {
            dataset_id,
            from_date,
            to_date,
            last_days,
            site_ids,
            operator_keys,
            point_keys,
            direction_keys,
            indicators,
            limit,
            publication_ids,
            country,
        } => {
            let settings = gaspipe_config::Settings::from_env()?;
            let pool = gaspipe_db::connect_from_env().await?;

            let (from_date, to_date) = default_window(from_date, to_date, last_days);
            let params = FetchParams {
                from_date,
                to_date,
                site_ids,
                operator_keys,
                point_keys,
                direction_keys,
                indicators,
                limit,
                publication_ids,
                country,
            };

            let orchestrator = Orchestrator::new(pool, default_registry(&settings));
            let outcome = orchestrator.run(&dataset_id, params).await?;

            println!("run_id={}", outcome.run_id);
            println!("dataset_id={}", outcome.dataset_id);
            println!("rows_fetched={}", outcome.rows_fetched);
            println!("rows_inserted={}", outcome.rows_inserted);
            println!("rows_deleted={}", outcome.rows_deleted);
        }
    }

    Ok(())
}

/// Scheduler-style defaulting: with `--last-days N` and no explicit dates,
/// the window is (today - N) .. today.
fn default_window(
    from_date: Option<String>,
    to_date: Option<String>,
    last_days: Option<i64>,
) -> (Option<String>, Option<String>) {
    match (from_date, to_date, last_days) {
        (None, None, Some(days)) => {
            let today = Utc::now().date_naive();
            let from = today - Duration::days(days);
            (Some(from.to_string()), Some(today.to_string()))
        }
        (from, to, _) => (from, to),
    }
}
