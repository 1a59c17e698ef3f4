//! National Gas GAS_QUALITY adapter.
//!
//! Historic gas-quality data is fetched in 2-day chunks with a politeness
//! pause between requests; each site row expands into one observation per
//! numeric metric (cv, wobbe, ...).

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde_json::Value;
use tracing::{info, warn};

use gaspipe_model::{
    make_series_id, FetchParams, JsonMap, Normalized, ObservationRecord, RawPayload, SeriesMeta,
    SOURCE_NATIONAL_GAS,
};

use crate::{check_status, http_client, transport_err, AdapterError, DatasetAdapter};

pub const DATASET_ID: &str = "GAS_QUALITY";

const DEFAULT_BASE_URL: &str = "https://api.nationalgas.com";
const HISTORIC_PATH: &str = "/operationaldata/v1/gasquality/historicdata";

/// Identifier and time columns; everything else numeric is a metric.
const KEY_COLUMNS: [&str; 4] = ["siteId", "areaName", "siteName", "publishedTime"];

/// Request-window chunk size in days.
const CHUNK_DAYS: i64 = 2;

#[derive(Debug, Clone)]
pub struct GasQualityAdapter {
    http: reqwest::Client,
    base_url: String,
}

impl Default for GasQualityAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GasQualityAdapter {
    pub fn new() -> Self {
        Self::new_with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn new_with_base_url(base_url: String) -> Self {
        Self {
            http: http_client(),
            base_url,
        }
    }

    fn historic_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), HISTORIC_PATH)
    }

    async fn fetch_chunk(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        site_ids: &[i64],
    ) -> Result<Vec<Value>, AdapterError> {
        let mut body = serde_json::json!({
            "fromDate": from.to_string(),
            "toDate": to.to_string(),
        });
        if !site_ids.is_empty() {
            body["siteIds"] = serde_json::json!(site_ids);
        }

        info!(from = %from, to = %to, "fetching GAS_QUALITY chunk");

        let mut resp = self
            .http
            .post(self.historic_url())
            .json(&body)
            .send()
            .await
            .map_err(transport_err)?;

        if resp.status().as_u16() == 429 {
            warn!("rate limited, sleeping 15 seconds");
            tokio::time::sleep(std::time::Duration::from_secs(15)).await;
            resp = self
                .http
                .post(self.historic_url())
                .json(&body)
                .send()
                .await
                .map_err(transport_err)?;
        }

        let resp = check_status(resp).await?;
        let data: Value = resp.json().await.map_err(|e| {
            AdapterError::Decode(format!("gas quality response json decode failed: {e}"))
        })?;

        match data {
            Value::Array(sites) => Ok(sites),
            other => Err(AdapterError::Decode(format!(
                "expected array of sites, got {other_kind}",
                other_kind = json_kind(&other)
            ))),
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `[from, to)` chunks of at most `days` days.
fn daterange_chunks(start: NaiveDate, end: NaiveDate, days: i64) -> Vec<(NaiveDate, NaiveDate)> {
    let mut chunks = Vec::new();
    let mut cur = start;
    while cur < end {
        let next = (cur + Duration::days(days)).min(end);
        chunks.push((cur, next));
        cur = next;
    }
    chunks
}

fn parse_date(name: &str, value: Option<&String>) -> Result<NaiveDate, AdapterError> {
    let raw = value
        .ok_or_else(|| AdapterError::Config(format!("GAS_QUALITY requires {name} (YYYY-MM-DD)")))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AdapterError::Config(format!("invalid {name}: {raw:?} (expected YYYY-MM-DD)")))
}

/// Reads a site id as an integer, accepting numbers and numeric strings.
fn site_id_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[async_trait]
impl DatasetAdapter for GasQualityAdapter {
    fn dataset_id(&self) -> &'static str {
        DATASET_ID
    }

    fn source(&self) -> &'static str {
        SOURCE_NATIONAL_GAS
    }

    fn validate_params(&self, params: &FetchParams) -> Result<(), AdapterError> {
        let from = parse_date("from_date", params.from_date.as_ref())?;
        let to = parse_date("to_date", params.to_date.as_ref())?;
        if to < from {
            return Err(AdapterError::Config(format!(
                "to_date {to} is before from_date {from}"
            )));
        }
        Ok(())
    }

    /// Honors `from_date`, `to_date` (required) and `site_ids`.
    async fn fetch(&self, params: &FetchParams) -> Result<RawPayload, AdapterError> {
        let start = parse_date("from_date", params.from_date.as_ref())?;
        let end = parse_date("to_date", params.to_date.as_ref())?;

        let mut all_rows: Vec<JsonMap> = Vec::new();

        for (from, to) in daterange_chunks(start, end, CHUNK_DAYS) {
            let sites = self.fetch_chunk(from, to, &params.site_ids).await?;

            for site in &sites {
                let Some(site_obj) = site.as_object() else {
                    continue;
                };
                let mut base = JsonMap::new();
                for key in ["siteId", "areaName", "siteName"] {
                    base.insert(
                        key.to_string(),
                        site_obj.get(key).cloned().unwrap_or(Value::Null),
                    );
                }
                let details = site_obj
                    .get("siteGasQualityDetail")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for point in details {
                    let mut row = base.clone();
                    if let Some(point_obj) = point.as_object() {
                        for (k, v) in point_obj {
                            row.insert(k.clone(), v.clone());
                        }
                    }
                    all_rows.push(row);
                }
            }

            // Politeness pause between chunks; the upstream rate limits.
            tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        }

        Ok(RawPayload::Rows(all_rows))
    }

    fn parse(&self, raw: &RawPayload) -> Result<Vec<JsonMap>, AdapterError> {
        match raw {
            RawPayload::Rows(rows) => Ok(rows.clone()),
            RawPayload::Document(_) => Err(AdapterError::Decode(
                "GAS_QUALITY adapter expects a row batch from fetch".to_string(),
            )),
        }
    }

    fn normalize(&self, record: &JsonMap) -> Vec<Normalized> {
        let Some(site_id) = record.get("siteId").and_then(site_id_i64) else {
            return Vec::new();
        };
        let Some(ts) = record
            .get("publishedTime")
            .and_then(Value::as_str)
            .and_then(gaspipe_model::parse_utc)
        else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for (key, value) in record {
            if KEY_COLUMNS.contains(&key.as_str()) {
                continue;
            }
            let Some(value) = gaspipe_model::value_as_f64(value) else {
                continue;
            };
            let series_id =
                make_series_id(DATASET_ID, &[&site_id.to_string(), &key.to_uppercase()]);
            out.push(Normalized::Observation(ObservationRecord {
                series_id,
                observation_time: ts,
                value,
                quality_flag: None,
                raw_payload: Some(Value::Object(record.clone())),
            }));
        }
        out
    }

    fn define_series(&self, normalized: &[Normalized]) -> Vec<SeriesMeta> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for record in normalized {
            let Normalized::Observation(obs) = record else {
                continue;
            };
            if !seen.insert(obs.series_id.clone()) {
                continue;
            }
            let parts: Vec<&str> = obs.series_id.split('_').collect();
            if parts.len() < 3 {
                continue;
            }
            let site_id = parts[parts.len() - 2];
            let data_item = parts[parts.len() - 1];
            out.push(SeriesMeta {
                series_id: obs.series_id.clone(),
                source: SOURCE_NATIONAL_GAS.to_string(),
                dataset_id: DATASET_ID.to_string(),
                data_item: data_item.to_string(),
                description: format!("{data_item} at site {site_id}"),
                unit: "UNKNOWN".to_string(),
                frequency: "intraday".to_string(),
                timezone_source: "UTC".to_string(),
                is_active: true,
            });
        }
        out
    }

    fn time_field(&self) -> &'static str {
        "observation_time"
    }
}

// ---------------------------------------------------------------------------
// Tests (no network except the mock server)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn row(value: Value) -> JsonMap {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn daterange_chunks_cover_the_window() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        let chunks = daterange_chunks(start, end, 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].0, start);
        assert_eq!(chunks[2].1, end);
        // Empty window yields no chunks.
        assert!(daterange_chunks(end, end, 2).is_empty());
    }

    #[test]
    fn validate_params_requires_date_window() {
        let adapter = GasQualityAdapter::new();
        let err = adapter.validate_params(&FetchParams::default()).unwrap_err();
        assert!(err.is_config());

        let ok = FetchParams {
            from_date: Some("2024-03-01".to_string()),
            to_date: Some("2024-03-02".to_string()),
            ..Default::default()
        };
        assert!(adapter.validate_params(&ok).is_ok());

        let backwards = FetchParams {
            from_date: Some("2024-03-02".to_string()),
            to_date: Some("2024-03-01".to_string()),
            ..Default::default()
        };
        assert!(adapter.validate_params(&backwards).is_err());
    }

    #[test]
    fn normalize_expands_one_row_per_metric() {
        let adapter = GasQualityAdapter::new();
        let record = row(json!({
            "siteId": 77,
            "areaName": "A",
            "siteName": "N",
            "publishedTime": "2024-03-01T12:00:00Z",
            "cv": 39.5,
            "wobbe": 49.2,
        }));

        let normalized = adapter.normalize(&record);
        assert_eq!(normalized.len(), 2);

        let ids: Vec<&str> = normalized
            .iter()
            .filter_map(|n| match n {
                Normalized::Observation(o) => Some(o.series_id.as_str()),
                _ => None,
            })
            .collect();
        assert!(ids.contains(&"NG_GAS_QUALITY_77_CV"));
        assert!(ids.contains(&"NG_GAS_QUALITY_77_WOBBE"));
    }

    #[test]
    fn normalize_skips_non_numeric_metrics_and_missing_keys() {
        let adapter = GasQualityAdapter::new();

        let no_site = row(json!({
            "publishedTime": "2024-03-01T12:00:00Z",
            "cv": 39.5,
        }));
        assert!(adapter.normalize(&no_site).is_empty());

        let no_time = row(json!({ "siteId": 77, "cv": 39.5 }));
        assert!(adapter.normalize(&no_time).is_empty());

        let mixed = row(json!({
            "siteId": 77,
            "publishedTime": "2024-03-01T12:00:00Z",
            "cv": 39.5,
            "note": "planned maintenance",
        }));
        assert_eq!(adapter.normalize(&mixed).len(), 1);
    }

    #[test]
    fn define_series_dedups_and_reconstructs_metadata() {
        let adapter = GasQualityAdapter::new();
        let record = row(json!({
            "siteId": 77,
            "publishedTime": "2024-03-01T12:00:00Z",
            "cv": 39.5,
        }));
        let mut normalized = adapter.normalize(&record);
        normalized.extend(adapter.normalize(&record));

        let series = adapter.define_series(&normalized);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].series_id, "NG_GAS_QUALITY_77_CV");
        assert_eq!(series[0].data_item, "CV");
        assert_eq!(series[0].description, "CV at site 77");
        assert_eq!(series[0].frequency, "intraday");
    }

    #[tokio::test]
    async fn fetch_flattens_sites_and_details() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/operationaldata/v1/gasquality/historicdata");
            then.status(200).json_body(json!([
                {
                    "siteId": 77,
                    "areaName": "A",
                    "siteName": "N",
                    "siteGasQualityDetail": [
                        {"publishedTime": "2024-03-01T12:00:00Z", "cv": 39.5},
                        {"publishedTime": "2024-03-01T13:00:00Z", "cv": 39.6}
                    ]
                }
            ]));
        });

        let adapter = GasQualityAdapter::new_with_base_url(server.base_url());
        let params = FetchParams {
            from_date: Some("2024-03-01".to_string()),
            to_date: Some("2024-03-02".to_string()),
            site_ids: vec![77],
            ..Default::default()
        };

        let raw = adapter.fetch(&params).await.unwrap();
        mock.assert();

        let RawPayload::Rows(rows) = raw else {
            panic!("expected row batch");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["siteId"], json!(77));
        assert_eq!(rows[0]["cv"], json!(39.5));
        assert_eq!(rows[1]["publishedTime"], json!("2024-03-01T13:00:00Z"));
    }

    #[tokio::test]
    async fn fetch_surfaces_upstream_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/operationaldata/v1/gasquality/historicdata");
            then.status(500).body("boom");
        });

        let adapter = GasQualityAdapter::new_with_base_url(server.base_url());
        let params = FetchParams {
            from_date: Some("2024-03-01".to_string()),
            to_date: Some("2024-03-02".to_string()),
            ..Default::default()
        };

        let err = adapter.fetch(&params).await.unwrap_err();
        match err {
            AdapterError::Api { status, .. } => assert_eq!(status, 500),
            other => panic!("expected api error, got {other}"),
        }
    }
}
