//! GIE AGSI/ALSI storage adapters.
//!
//! Both transparency APIs share one response shape: a `data` array of
//! per-country entries whose non-excluded keys are the variables. ALSI nests
//! some variables one level deeper; those flatten to `{key}_{subkey}`.
//! Storage is handled by the orchestrator through the relational backend, so
//! `define_series` is empty here.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::info;

use gaspipe_model::{
    FetchParams, GieRecord, JsonMap, Normalized, RawPayload, SeriesMeta, SOURCE_GIE_AGSI,
    SOURCE_GIE_ALSI,
};

use crate::{check_status, http_client, transport_err, AdapterError, DatasetAdapter};

pub const DATASET_AGSI: &str = "AGSI";
pub const DATASET_ALSI: &str = "ALSI";

const AGSI_BASE_URL: &str = "https://agsi.gie.eu/api";
const ALSI_BASE_URL: &str = "https://alsi.gie.eu/api";

/// Entry keys that are identity/bookkeeping, not variables.
const EXCLUDED_KEYS: [&str; 7] = [
    "name",
    "code",
    "url",
    "updatedAt",
    "gasDayStart",
    "gasDayEnd",
    "info",
];

fn is_null_like(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty() || s == " ",
        _ => false,
    }
}

#[derive(Debug, Clone)]
pub struct GieStorageAdapter {
    dataset_id: &'static str,
    source: &'static str,
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GieStorageAdapter {
    pub fn agsi(api_key: Option<String>) -> Self {
        Self::agsi_with_base_url(api_key, AGSI_BASE_URL.to_string())
    }

    pub fn agsi_with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self {
            dataset_id: DATASET_AGSI,
            source: SOURCE_GIE_AGSI,
            http: http_client(),
            base_url,
            api_key,
        }
    }

    pub fn alsi(api_key: Option<String>) -> Self {
        Self::alsi_with_base_url(api_key, ALSI_BASE_URL.to_string())
    }

    pub fn alsi_with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self {
            dataset_id: DATASET_ALSI,
            source: SOURCE_GIE_ALSI,
            http: http_client(),
            base_url,
            api_key,
        }
    }

    fn api_key(&self) -> Result<&str, AdapterError> {
        self.api_key.as_deref().ok_or_else(|| {
            AdapterError::Config(format!(
                "{} requires GIE_API_KEY to be configured",
                self.dataset_id
            ))
        })
    }
}

/// Flatten one GIE response document into per-(country, date, variable) rows.
///
/// Entries without a gas day are skipped; an unparseable gas day fails the
/// whole document. List values are skipped (GIE returns `info: []`).
fn transform(raw: &Value) -> Result<Vec<JsonMap>, AdapterError> {
    let mut rows: Vec<JsonMap> = Vec::new();

    let entries = raw
        .get("data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for entry in &entries {
        let Some(entry_obj) = entry.as_object() else {
            continue;
        };
        let Some(country) = entry_obj.get("name").and_then(Value::as_str) else {
            continue;
        };
        let gas_day = entry_obj
            .get("gasDayStart")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if gas_day.is_empty() {
            continue;
        }
        let date = NaiveDate::parse_from_str(gas_day, "%Y-%m-%d").map_err(|_| {
            AdapterError::Decode(format!("invalid gasDayStart: {gas_day:?}"))
        })?;
        let quality = entry_obj.get("status").and_then(Value::as_str);

        for (key, value) in entry_obj {
            if EXCLUDED_KEYS.contains(&key.as_str()) {
                continue;
            }
            match value {
                Value::Array(_) => continue,
                Value::Object(nested) => {
                    for (sub_key, sub_value) in nested {
                        let numeric = if is_null_like(sub_value) {
                            None
                        } else {
                            match gaspipe_model::lenient_f64(sub_value) {
                                Some(v) => Some(v),
                                None => continue,
                            }
                        };
                        rows.push(transform_row(
                            country,
                            date,
                            &format!("{key}_{sub_key}"),
                            numeric,
                            quality,
                        ));
                    }
                }
                scalar => {
                    let numeric = if is_null_like(scalar) {
                        None
                    } else {
                        match gaspipe_model::lenient_f64(scalar) {
                            Some(v) => Some(v),
                            None => continue,
                        }
                    };
                    rows.push(transform_row(country, date, key, numeric, quality));
                }
            }
        }
    }

    Ok(rows)
}

fn transform_row(
    country: &str,
    date: NaiveDate,
    variable: &str,
    value: Option<f64>,
    quality: Option<&str>,
) -> JsonMap {
    let mut row = JsonMap::new();
    row.insert("country".to_string(), Value::String(country.to_string()));
    row.insert("date".to_string(), Value::String(date.to_string()));
    row.insert("variable".to_string(), Value::String(variable.to_string()));
    row.insert(
        "value".to_string(),
        value.map(gaspipe_model::json_number).unwrap_or(Value::Null),
    );
    row.insert(
        "quality".to_string(),
        quality.map_or(Value::Null, |q| Value::String(q.to_string())),
    );
    row
}

#[async_trait]
impl DatasetAdapter for GieStorageAdapter {
    fn dataset_id(&self) -> &'static str {
        self.dataset_id
    }

    fn source(&self) -> &'static str {
        self.source
    }

    fn validate_params(&self, _params: &FetchParams) -> Result<(), AdapterError> {
        self.api_key().map(|_| ())
    }

    /// Honors `country`; authenticates with the `x-key` header.
    async fn fetch(&self, params: &FetchParams) -> Result<RawPayload, AdapterError> {
        let api_key = self.api_key()?.to_string();

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(country) = &params.country {
            query.push(("country", country.clone()));
        }

        info!(dataset = self.dataset_id, ?query, "fetching GIE");

        let resp = self
            .http
            .get(self.base_url.as_str())
            .header("x-key", api_key)
            .query(&query)
            .send()
            .await
            .map_err(transport_err)?;
        let resp = check_status(resp).await?;

        let doc: Value = resp
            .json()
            .await
            .map_err(|e| AdapterError::Decode(format!("gie response json decode failed: {e}")))?;

        Ok(RawPayload::Document(doc))
    }

    fn parse(&self, raw: &RawPayload) -> Result<Vec<JsonMap>, AdapterError> {
        match raw {
            RawPayload::Document(doc) => transform(doc),
            RawPayload::Rows(_) => Err(AdapterError::Decode(format!(
                "{} adapter expects a JSON document from fetch",
                self.dataset_id
            ))),
        }
    }

    fn normalize(&self, record: &JsonMap) -> Vec<Normalized> {
        let Some(country) = record.get("country").and_then(Value::as_str) else {
            return Vec::new();
        };
        let Some(date) = record
            .get("date")
            .and_then(Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        else {
            return Vec::new();
        };
        let Some(variable) = record.get("variable").and_then(Value::as_str) else {
            return Vec::new();
        };

        let value = record.get("value").and_then(gaspipe_model::value_as_f64);
        let quality = record
            .get("quality")
            .and_then(Value::as_str)
            .map(str::to_string);

        vec![Normalized::GieDaily(GieRecord {
            country: country.to_string(),
            date,
            variable: variable.to_string(),
            value,
            quality,
        })]
    }

    /// GIE series are created during insert (`meta.series`); nothing here.
    fn define_series(&self, _normalized: &[Normalized]) -> Vec<SeriesMeta> {
        Vec::new()
    }

    fn time_field(&self) -> &'static str {
        "date"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn agsi_doc() -> Value {
        json!({
            "data": [{
                "name": "Netherlands",
                "code": "NL",
                "url": "nl",
                "gasDayStart": "2024-03-01",
                "gasDayEnd": "2024-03-02",
                "status": "E",
                "info": [],
                "gasInStorage": "52.3",
                "full": "61.2",
                "trend": "-0.1",
                "consumption": ""
            }]
        })
    }

    #[test]
    fn transform_flattens_scalars_and_carries_nulls() {
        let rows = transform(&agsi_doc()).unwrap();
        // gasInStorage, full, trend, consumption (null-like -> null value row)
        assert_eq!(rows.len(), 4);

        let in_storage = rows
            .iter()
            .find(|r| r["variable"] == json!("gasInStorage"))
            .unwrap();
        assert_eq!(in_storage["country"], json!("Netherlands"));
        assert_eq!(in_storage["date"], json!("2024-03-01"));
        assert_eq!(in_storage["value"], json!(52.3));
        assert_eq!(in_storage["quality"], json!("E"));

        let consumption = rows
            .iter()
            .find(|r| r["variable"] == json!("consumption"))
            .unwrap();
        assert_eq!(consumption["value"], Value::Null);
    }

    #[test]
    fn transform_flattens_nested_alsi_variables() {
        let doc = json!({
            "data": [{
                "name": "Belgium",
                "gasDayStart": "2024-03-01",
                "status": "C",
                "lngInventory": {"mcm": "7.5", "tons": "3400"},
                "sendOut": "101.2"
            }]
        });

        let rows = transform(&doc).unwrap();
        let variables: Vec<&str> = rows
            .iter()
            .filter_map(|r| r["variable"].as_str())
            .collect();
        assert!(variables.contains(&"lngInventory_mcm"));
        assert!(variables.contains(&"lngInventory_tons"));
        assert!(variables.contains(&"sendOut"));
    }

    #[test]
    fn transform_skips_entries_without_gas_day_and_non_numeric() {
        let doc = json!({
            "data": [
                {"name": "X", "gasInStorage": "1.0"},
                {"name": "Y", "gasDayStart": "", "gasInStorage": "1.0"},
                {"name": "Z", "gasDayStart": "2024-03-01", "note": "offline", "level": "5.5"}
            ]
        });

        let rows = transform(&doc).unwrap();
        // Only Z contributes, and only its numeric variable.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["variable"], json!("level"));
    }

    #[test]
    fn transform_rejects_malformed_gas_day() {
        let doc = json!({
            "data": [{"name": "X", "gasDayStart": "01/03/2024", "level": "1"}]
        });
        assert!(matches!(transform(&doc), Err(AdapterError::Decode(_))));
    }

    #[test]
    fn normalize_builds_gie_records() {
        let adapter = GieStorageAdapter::agsi(Some("k".to_string()));
        let rows = transform(&agsi_doc()).unwrap();
        let normalized: Vec<Normalized> =
            rows.iter().flat_map(|r| adapter.normalize(r)).collect();
        assert_eq!(normalized.len(), 4);

        let Normalized::GieDaily(first) = &normalized[0] else {
            panic!("expected gie record");
        };
        assert_eq!(first.country, "Netherlands");
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let adapter = GieStorageAdapter::agsi(None);
        let err = adapter.validate_params(&FetchParams::default()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn define_series_is_empty_for_gie() {
        let adapter = GieStorageAdapter::alsi(Some("k".to_string()));
        assert!(adapter.define_series(&[]).is_empty());
        assert_eq!(adapter.time_field(), "date");
    }

    #[tokio::test]
    async fn fetch_sends_key_header_and_country_param() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/")
                .header("x-key", "secret")
                .query_param("country", "NL");
            then.status(200).json_body(agsi_doc());
        });

        let adapter =
            GieStorageAdapter::agsi_with_base_url(Some("secret".to_string()), server.base_url());
        let params = FetchParams {
            country: Some("NL".to_string()),
            ..Default::default()
        };

        let raw = adapter.fetch(&params).await.unwrap();
        mock.assert();
        assert!(matches!(raw, RawPayload::Document(_)));
    }
}
