//! ENTSOG transparency-platform adapter.
//!
//! Requires either at least one indicator, or both point and direction keys;
//! anything less is a configuration error raised before the HTTP call.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use gaspipe_model::{
    lenient_f64, make_series_id, parse_utc, FetchParams, JsonMap, Normalized, ObservationRecord,
    RawPayload, SeriesMeta, SOURCE_ENTSOG,
};

use crate::{check_status, http_client, transport_err, AdapterError, DatasetAdapter};

pub const DATASET_ID: &str = "ENTSOG";

const DEFAULT_BASE_URL: &str = "https://transparency.entsog.eu";
const OPERATIONAL_DATA_PATH: &str = "/api/v1/operationaldatas";

const REQUIRED_KEYS: [&str; 3] = ["indicator", "pointKey", "directionKey"];

#[derive(Debug, Clone)]
pub struct EntsogAdapter {
    http: reqwest::Client,
    base_url: String,
}

impl Default for EntsogAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl EntsogAdapter {
    pub fn new() -> Self {
        Self::new_with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn new_with_base_url(base_url: String) -> Self {
        Self {
            http: http_client(),
            base_url,
        }
    }

    fn operational_data_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            OPERATIONAL_DATA_PATH
        )
    }
}

fn require_selectors(params: &FetchParams) -> Result<(), AdapterError> {
    let has_indicator = !params.indicators.is_empty();
    let has_point_direction = !params.point_keys.is_empty() && !params.direction_keys.is_empty();
    if !has_indicator && !has_point_direction {
        return Err(AdapterError::Config(
            "ENTSOG requires at least one of: 1) indicator, 2) pointKey + directionKey"
                .to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl DatasetAdapter for EntsogAdapter {
    fn dataset_id(&self) -> &'static str {
        DATASET_ID
    }

    fn source(&self) -> &'static str {
        SOURCE_ENTSOG
    }

    fn validate_params(&self, params: &FetchParams) -> Result<(), AdapterError> {
        require_selectors(params)
    }

    /// Honors `from_date`, `to_date`, `operator_keys`, `point_keys`,
    /// `direction_keys`, `indicators` (space-stripped) and `limit`.
    async fn fetch(&self, params: &FetchParams) -> Result<RawPayload, AdapterError> {
        require_selectors(params)?;

        let mut query: Vec<(&str, String)> = vec![("periodType", "day".to_string())];
        if let Some(from) = &params.from_date {
            query.push(("periodFrom", from.clone()));
        }
        if let Some(to) = &params.to_date {
            query.push(("periodTo", to.clone()));
        }
        if !params.operator_keys.is_empty() {
            query.push(("operatorKey", params.operator_keys.join(",")));
        }
        if !params.point_keys.is_empty() {
            query.push(("pointKey", params.point_keys.join(",")));
        }
        if !params.direction_keys.is_empty() {
            query.push(("directionKey", params.direction_keys.join(",")));
        }
        if !params.indicators.is_empty() {
            let indicators: Vec<String> = params
                .indicators
                .iter()
                .map(|i| i.replace(' ', ""))
                .collect();
            query.push(("indicator", indicators.join(",")));
        }
        if let Some(limit) = params.limit {
            query.push(("limit", limit.to_string()));
        }

        info!(?query, "fetching ENTSOG");

        let resp = self
            .http
            .get(self.operational_data_url())
            .query(&query)
            .send()
            .await
            .map_err(transport_err)?;
        let resp = check_status(resp).await?;

        let data: Value = resp
            .json()
            .await
            .map_err(|e| AdapterError::Decode(format!("entsog response json decode failed: {e}")))?;

        // Object-with-`operationaldatas` or a bare array are both accepted.
        let records = match data {
            Value::Object(mut obj) => match obj.remove("operationaldatas") {
                Some(Value::Array(records)) => records,
                _ => {
                    let keys: Vec<&String> = obj.keys().collect();
                    return Err(AdapterError::Decode(format!(
                        "invalid ENTSOG response keys: {keys:?}"
                    )));
                }
            },
            Value::Array(records) => records,
            other => {
                return Err(AdapterError::Decode(format!(
                    "unexpected ENTSOG response type: {other}"
                )))
            }
        };

        let rows = records
            .into_iter()
            .filter_map(|r| r.as_object().cloned())
            .collect();
        Ok(RawPayload::Rows(rows))
    }

    fn parse(&self, raw: &RawPayload) -> Result<Vec<JsonMap>, AdapterError> {
        match raw {
            RawPayload::Rows(rows) => Ok(rows.clone()),
            RawPayload::Document(_) => Err(AdapterError::Decode(
                "ENTSOG adapter expects a row batch from fetch".to_string(),
            )),
        }
    }

    fn normalize(&self, record: &JsonMap) -> Vec<Normalized> {
        if REQUIRED_KEYS.iter().any(|k| !record.contains_key(*k)) {
            return Vec::new();
        }

        let indicator = record.get("indicator").and_then(Value::as_str);
        let point = record.get("pointKey").and_then(Value::as_str);
        let direction = record.get("directionKey").and_then(Value::as_str);
        let (Some(indicator), Some(point), Some(direction)) = (indicator, point, direction) else {
            return Vec::new();
        };

        let Some(value) = record.get("value").and_then(|v| lenient_f64(v)) else {
            return Vec::new();
        };
        let Some(ts) = record
            .get("periodFrom")
            .and_then(Value::as_str)
            .and_then(parse_utc)
        else {
            return Vec::new();
        };

        let series_id = make_series_id(DATASET_ID, &[indicator, point, direction]);
        let quality_flag = record
            .get("flowStatus")
            .and_then(Value::as_str)
            .map(str::to_string);

        vec![Normalized::Observation(ObservationRecord {
            series_id,
            observation_time: ts,
            value,
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
            let parts: Vec<&str> = obs.series_id.split('_').collect();
            if parts.len() < 5 {
                continue;
            }
            // NG _ ENTSOG _ <indicator words...> _ <point> _ <direction>
            let indicator = parts[2..parts.len() - 2].join(" ");
            let point = parts[parts.len() - 2];
            let direction = parts[parts.len() - 1];
            out.push(SeriesMeta {
                series_id: obs.series_id.clone(),
                source: SOURCE_ENTSOG.to_string(),
                dataset_id: DATASET_ID.to_string(),
                data_item: indicator.clone(),
                description: format!("{indicator} at {point} ({direction})"),
                unit: "UNKNOWN".to_string(),
                frequency: "daily".to_string(),
                timezone_source: "Europe/Brussels".to_string(),
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
