//! gaspipe-model
//!
//! Domain types shared by every gaspipe crate: canonical observations,
//! series metadata, raw payload shapes, fetch parameters, and the
//! deterministic series-id builder.
//!
//! This crate performs no I/O. Database and HTTP concerns live in
//! `gaspipe-db` and `gaspipe-adapters` respectively.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parsed row as produced by `parse`: one flat JSON object per record.
pub type JsonMap = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Source tags
// ---------------------------------------------------------------------------

pub const SOURCE_NATIONAL_GAS: &str = "NATIONAL_GAS";
pub const SOURCE_ENTSOG: &str = "ENTSOG";
pub const SOURCE_GIE_AGSI: &str = "GIE_AGSI";
pub const SOURCE_GIE_ALSI: &str = "GIE_ALSI";

/// Maps a GIE dataset id to its storage source tag.
///
/// GIE datasets are the only ones routed to the relational
/// `meta.series` / `energy.daily` backend; everything else uses the flat
/// `meta_series` / `data_observations` tables.
pub fn gie_source(dataset_id: &str) -> Option<&'static str> {
    match dataset_id {
        "AGSI" => Some(SOURCE_GIE_AGSI),
        "ALSI" => Some(SOURCE_GIE_ALSI),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Series id
// ---------------------------------------------------------------------------

/// Builds a canonical series id: `NG_<DATASET_ID>_<PART1>_<PART2>_...`.
///
/// Each part is uppercased, commas and parentheses stripped, spaces replaced
/// by underscores. Empty parts are skipped. Total and deterministic: the same
/// inputs always produce the same id, across processes.
pub fn make_series_id(dataset_id: &str, parts: &[&str]) -> String {
    let slug = parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.to_uppercase()
                .replace(',', "")
                .replace('(', "")
                .replace(')', "")
                .replace(' ', "_")
        })
        .collect::<Vec<_>>()
        .join("_");
    format!("NG_{dataset_id}_{slug}")
}

// ---------------------------------------------------------------------------
// Canonical records
// ---------------------------------------------------------------------------

/// One normalized observation bound for the flat
/// `data_observations` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub series_id: String,
    /// UTC-aware observation timestamp.
    pub observation_time: DateTime<Utc>,
    pub value: f64,
    pub quality_flag: Option<String>,
    /// The originating row, NaN-scrubbed to null.
    pub raw_payload: Option<Value>,
}

/// One normalized daily value bound for the relational GIE backend
/// (`energy.daily`). The series itself is resolved at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GieRecord {
    pub country: String,
    pub date: NaiveDate,
    pub variable: String,
    /// Null-like upstream values (`""`, `" "`, null) are carried as None.
    pub value: Option<f64>,
    pub quality: Option<String>,
}

/// A normalized record, routed to one of the two storage backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Normalized {
    Observation(ObservationRecord),
    GieDaily(GieRecord),
}

impl Normalized {
    /// Returns the record's timestamp for the named time field, if it
    /// carries one. Daily dates are read as midnight UTC.
    pub fn time_for_field(&self, field: &str) -> Option<DateTime<Utc>> {
        match self {
            Normalized::Observation(o) if field == "observation_time" => {
                Some(o.observation_time)
            }
            Normalized::GieDaily(g) if field == "date" => {
                g.date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt))
            }
            _ => None,
        }
    }
}

/// Canonical series metadata for the flat `meta_series` catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMeta {
    pub series_id: String,
    pub source: String,
    pub dataset_id: String,
    pub data_item: String,
    pub description: String,
    pub unit: String,
    /// `daily` | `intraday`
    pub frequency: String,
    /// IANA zone name or `UTC`.
    pub timezone_source: String,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Raw payload
// ---------------------------------------------------------------------------

/// What `fetch` returns: a rectangular batch of rows, or one whole JSON
/// document (GIE).
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Rows(Vec<JsonMap>),
    Document(Value),
}

impl RawPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            RawPayload::Rows(rows) => rows.is_empty(),
            RawPayload::Document(doc) => doc.is_null(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch parameters
// ---------------------------------------------------------------------------

/// Heterogeneous parameter bundle passed through the orchestrator to
/// `fetch`. Each adapter documents which keys it honors; unknown keys are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchParams {
    /// Inclusive start date, `YYYY-MM-DD`.
    pub from_date: Option<String>,
    /// Inclusive end date, `YYYY-MM-DD`.
    pub to_date: Option<String>,
    pub site_ids: Vec<i64>,
    pub operator_keys: Vec<String>,
    pub point_keys: Vec<String>,
    pub direction_keys: Vec<String>,
    pub indicators: Vec<String>,
    pub limit: Option<i64>,
    pub publication_ids: Vec<String>,
    pub country: Option<String>,
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

/// Converts an `f64` into a JSON value, substituting null for NaN/±inf.
///
/// `serde_json::Number` cannot represent non-finite floats; this is the one
/// place the NaN-to-null scrub of raw payloads happens.
pub fn json_number(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

/// Strict numeric read: JSON numbers only (booleans and numeric strings are
/// not numbers here).
pub fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Lenient numeric read: JSON numbers, or strings that parse as a float.
/// Empty and whitespace-only strings yield None.
pub fn lenient_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()
        }
        _ => None,
    }
}

/// Parses an upstream timestamp string as UTC.
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS`, naive
/// `YYYY-MM-DD HH:MM:SS`, and bare dates. Naive forms are read as UTC.
pub fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
