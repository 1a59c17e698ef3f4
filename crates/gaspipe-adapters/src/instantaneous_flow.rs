//! National Gas INSTANTANEOUS_FLOW adapter.
//!
//! One unparameterised GET; the nested site/detail structure flattens to one
//! row per site reading.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use gaspipe_model::{
    lenient_f64, make_series_id, parse_utc, FetchParams, JsonMap, Normalized, ObservationRecord,
    RawPayload, SeriesMeta, SOURCE_NATIONAL_GAS,
};

use crate::{check_status, http_client, transport_err, AdapterError, DatasetAdapter};

pub const DATASET_ID: &str = "INSTANTANEOUS_FLOW";

const DEFAULT_BASE_URL: &str = "https://api.nationalgas.com";
const SITES_PATH: &str = "/operationaldata/v1/instantaneousflow/sites";

const SERIES_PREFIX: &str = "NG_INSTANTANEOUS_FLOW_";
const SERIES_SUFFIX: &str = "_FLOWRATE";

#[derive(Debug, Clone)]
pub struct InstantaneousFlowAdapter {
    http: reqwest::Client,
    base_url: String,
}

impl Default for InstantaneousFlowAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl InstantaneousFlowAdapter {
    pub fn new() -> Self {
        Self::new_with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn new_with_base_url(base_url: String) -> Self {
        Self {
            http: http_client(),
            base_url,
        }
    }

    fn sites_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), SITES_PATH)
    }
}

#[async_trait]
impl DatasetAdapter for InstantaneousFlowAdapter {
    fn dataset_id(&self) -> &'static str {
        DATASET_ID
    }

    fn source(&self) -> &'static str {
        SOURCE_NATIONAL_GAS
    }

    /// Honors no parameters; the endpoint always returns the current picture.
    async fn fetch(&self, _params: &FetchParams) -> Result<RawPayload, AdapterError> {
        info!(url = %self.sites_url(), "fetching INSTANTANEOUS_FLOW");

        let resp = self
            .http
            .get(self.sites_url())
            .send()
            .await
            .map_err(transport_err)?;
        let resp = check_status(resp).await?;

        let data: Value = resp.json().await.map_err(|e| {
            AdapterError::Decode(format!("instantaneous flow json decode failed: {e}"))
        })?;

        let mut rows: Vec<JsonMap> = Vec::new();
        let blocks = data
            .get("instantaneousFlow")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for block in blocks {
            let sites = block
                .get("sites")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for site in sites {
                let site_name = site.get("siteName").cloned().unwrap_or(Value::Null);
                let details = site
                    .get("siteGasDetail")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for detail in details {
                    let mut row = JsonMap::new();
                    row.insert("siteName".to_string(), site_name.clone());
                    for key in ["applicableAt", "flowRate", "qualityIndicator", "scheduleTime"] {
                        row.insert(
                            key.to_string(),
                            detail.get(key).cloned().unwrap_or(Value::Null),
                        );
                    }
                    rows.push(row);
                }
            }
        }

        Ok(RawPayload::Rows(rows))
    }

    fn parse(&self, raw: &RawPayload) -> Result<Vec<JsonMap>, AdapterError> {
        match raw {
            RawPayload::Rows(rows) => Ok(rows.clone()),
            RawPayload::Document(_) => Err(AdapterError::Decode(
                "INSTANTANEOUS_FLOW adapter expects a row batch from fetch".to_string(),
            )),
        }
    }

    fn normalize(&self, record: &JsonMap) -> Vec<Normalized> {
        let Some(site_name) = record.get("siteName").and_then(Value::as_str) else {
            return Vec::new();
        };
        let Some(ts) = record
            .get("applicableAt")
            .and_then(Value::as_str)
            .and_then(parse_utc)
        else {
            return Vec::new();
        };
        let Some(flow_rate) = record.get("flowRate").and_then(|v| lenient_f64(v)) else {
            return Vec::new();
        };

        let series_id = make_series_id(DATASET_ID, &[site_name, "FLOWRATE"]);
        let quality_flag = record
            .get("qualityIndicator")
            .and_then(Value::as_str)
            .map(str::to_string);

        vec![Normalized::Observation(ObservationRecord {
            series_id,
            observation_time: ts,
            value: flow_rate,
            quality_flag,
            raw_payload: Some(Value::Object(record.clone())),
        })]
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
            if !obs.series_id.starts_with(SERIES_PREFIX)
                || !obs.series_id.ends_with(SERIES_SUFFIX)
            {
                continue;
            }
            let site = &obs.series_id[SERIES_PREFIX.len()..obs.series_id.len() - SERIES_SUFFIX.len()];
            out.push(SeriesMeta {
                series_id: obs.series_id.clone(),
                source: SOURCE_NATIONAL_GAS.to_string(),
                dataset_id: DATASET_ID.to_string(),
                data_item: "flowRate".to_string(),
                description: format!("Instantaneous Flow at {site}"),
                unit: "UNKNOWN".to_string(),
                frequency: "intraday".to_string(),
                timezone_source: "Europe/London".to_string(),
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
// Tests
// ---------------------------------------------------------------------------
