//! gaspipe-adapters
//!
//! The per-dataset adapter contract and its six implementations. An adapter
//! is a stateless translator from upstream bytes to canonical records:
//! `fetch` is the only operation that does I/O, and nothing here touches the
//! database, retries, or run bookkeeping — that is all orchestrator-owned.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use gaspipe_model::{FetchParams, JsonMap, Normalized, RawPayload, SeriesMeta};

pub mod entsog;
pub mod gas_publications;
pub mod gas_quality;
pub mod gie;
pub mod instantaneous_flow;

pub use entsog::EntsogAdapter;
pub use gas_publications::GasPublicationsAdapter;
pub use gas_quality::GasQualityAdapter;
pub use gie::GieStorageAdapter;
pub use instantaneous_flow::InstantaneousFlowAdapter;

/// Per-request timeout applied by every adapter's HTTP client.
pub const HTTP_TIMEOUT_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors an adapter may return.
#[derive(Debug)]
pub enum AdapterError {
    /// Missing or invalid caller-supplied parameter or credential.
    /// Surfaces before any side effect; the orchestrator never opens a run.
    Config(String),
    /// Network or transport failure.
    Transport(String),
    /// The upstream API returned a non-success status.
    Api { status: u16, message: String },
    /// A response payload could not be decoded or had an unexpected shape.
    Decode(String),
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::Config(msg) => write!(f, "config error: {msg}"),
            AdapterError::Transport(msg) => write!(f, "transport error: {msg}"),
            AdapterError::Api { status, message } => {
                write!(f, "upstream api error status={status}: {message}")
            }
            AdapterError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    /// True for configuration errors, which must abort before any run opens.
    pub fn is_config(&self) -> bool {
        matches!(self, AdapterError::Config(_))
    }
}

/// Maps a reqwest failure onto the adapter error taxonomy.
pub(crate) fn transport_err(err: reqwest::Error) -> AdapterError {
    AdapterError::Transport(err.to_string())
}

/// Converts a non-success response into an Api error.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, AdapterError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(AdapterError::Api {
        status: status.as_u16(),
        message,
    })
}

// ---------------------------------------------------------------------------
// Validation rules
// ---------------------------------------------------------------------------

/// Inclusive time bounds for the validator's date-range rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateRange {
    pub min_date: Option<chrono::DateTime<chrono::Utc>>,
    pub max_date: Option<chrono::DateTime<chrono::Utc>>,
}

/// Rules an adapter declares for the core validator to run. Empty means no
/// checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationConfig {
    pub required_fields: Vec<String>,
    pub min_row_count: Option<usize>,
    pub date_range: Option<DateRange>,
}

impl ValidationConfig {
    pub fn is_empty(&self) -> bool {
        self.required_fields.is_empty()
            && self.min_row_count.is_none()
            && self.date_range.is_none()
    }
}

// ---------------------------------------------------------------------------
// Adapter contract
// ---------------------------------------------------------------------------

/// Contract for all dataset ingestion adapters.
///
/// Adapters MUST NOT: write to the database, delete records, retry requests,
/// or control the run lifecycle. They ONLY translate.
#[async_trait]
pub trait DatasetAdapter: Send + Sync {
    /// Stable dataset tag (e.g. `"GAS_QUALITY"`).
    fn dataset_id(&self) -> &'static str;

    /// Source tag recorded with raw events and series (e.g. `"ENTSOG"`).
    fn source(&self) -> &'static str;

    /// Check caller-supplied parameters before any side effect. A `Config`
    /// error here means no run is opened.
    fn validate_params(&self, _params: &FetchParams) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Fetch raw data from the upstream. No retry (the orchestrator owns
    /// that), no database access.
    async fn fetch(&self, params: &FetchParams) -> Result<RawPayload, AdapterError>;

    /// Parse the raw payload into an ordered list of flat records.
    /// Empty input yields empty output; a payload of the wrong shape is a
    /// contract violation and fails the run.
    fn parse(&self, raw: &RawPayload) -> Result<Vec<JsonMap>, AdapterError>;

    /// Normalize one record into zero or more canonical records.
    /// Non-numeric or missing values filter the record out, never error.
    fn normalize(&self, record: &JsonMap) -> Vec<Normalized>;

    /// Deduplicated canonical series metadata for what was just normalized.
    /// GIE adapters return empty (series are created inline at insert).
    fn define_series(&self, normalized: &[Normalized]) -> Vec<SeriesMeta>;

    /// Name of the time attribute the delete policy prunes on.
    fn time_field(&self) -> &'static str;

    /// Optional validation rules; the default declares none.
    fn validation_config(&self) -> ValidationConfig {
        ValidationConfig::default()
    }
}

/// HTTP client shared by adapter constructors: 60 s per-request timeout.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .expect("http client build")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
