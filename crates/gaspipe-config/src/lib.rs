//! Environment-driven settings.
//!
//! The only ambient configuration is environment variables (plus a dev-time
//! `.env` file loaded via dotenvy). Database coordinates, log level, and the
//! GIE API key; nothing else.

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Settings {
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub log_level: String,
    /// Required by the AGSI/ALSI adapters only; absence is a configuration
    /// error surfaced before any GIE fetch.
    pub gie_api_key: Option<String>,
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// Loads `.env` first (best effort), then reads the `POSTGRES_*`
    /// variables, `LOG_LEVEL` (default `info`), and `GIE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        // Dev-time bootstrap; absent .env is fine.
        let _ = dotenvy::dotenv();

        Ok(Self {
            db_host: require("POSTGRES_HOST")?,
            db_port: std::env::var("POSTGRES_PORT")
                .unwrap_or_else(|_| "5432".to_string())
                .parse::<u16>()
                .context("POSTGRES_PORT must be a port number")?,
            db_name: require("POSTGRES_DB")?,
            db_user: require("POSTGRES_USER")?,
            db_password: require("POSTGRES_PASSWORD")?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            gie_api_key: std::env::var("GIE_API_KEY").ok().filter(|k| !k.is_empty()),
        })
    }

    /// Postgres connection URL assembled from the individual coordinates.
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
        )
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("missing env var {name}"))
}
