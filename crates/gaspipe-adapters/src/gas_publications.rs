//! National Gas GAS_PUBLICATIONS adapter.
//!
//! Gas-day publications, latest value per publication id.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use gaspipe_model::{
    lenient_f64, make_series_id, parse_utc, FetchParams, JsonMap, Normalized, ObservationRecord,
    RawPayload, SeriesMeta, SOURCE_NATIONAL_GAS,
};

use crate::{check_status, http_client, transport_err, AdapterError, DatasetAdapter};

pub const DATASET_ID: &str = "GAS_PUBLICATIONS";

const DEFAULT_BASE_URL: &str = "https://api.nationalgas.com";
const GAS_DAY_PATH: &str = "/operationaldata/v1/publications/gasday";

#[derive(Debug, Clone)]
pub struct GasPublicationsAdapter {
    http: reqwest::Client,
    base_url: String,
}

impl Default for GasPublicationsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GasPublicationsAdapter {
    pub fn new() -> Self {
        Self::new_with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn new_with_base_url(base_url: String) -> Self {
        Self {
            http: http_client(),
            base_url,
        }
    }

    fn gas_day_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), GAS_DAY_PATH)
    }
}

#[async_trait]
impl DatasetAdapter for GasPublicationsAdapter {
    fn dataset_id(&self) -> &'static str {
        DATASET_ID
    }

    fn source(&self) -> &'static str {
        SOURCE_NATIONAL_GAS
    }

    fn validate_params(&self, params: &FetchParams) -> Result<(), AdapterError> {
        if params.from_date.is_none() || params.to_date.is_none() {
            return Err(AdapterError::Config(
                "GAS_PUBLICATIONS requires from_date and to_date (YYYY-MM-DD)".to_string(),
            ));
        }
        if params.publication_ids.is_empty() {
            return Err(AdapterError::Config(
                "GAS_PUBLICATIONS requires at least one publication_id".to_string(),
            ));
        }
        Ok(())
    }

    /// Honors `from_date`, `to_date` and `publication_ids` (all required).
    async fn fetch(&self, params: &FetchParams) -> Result<RawPayload, AdapterError> {
        self.validate_params(params)?;

        let body = serde_json::json!({
            "fromDate": params.from_date,
            "toDate": params.to_date,
            "publicationIds": params.publication_ids,
            "latestValue": "Y",
        });

        info!(publication_ids = ?params.publication_ids, "fetching GAS_PUBLICATIONS");

        let resp = self
            .http
            .post(self.gas_day_url())
            .json(&body)
            .send()
            .await
            .map_err(transport_err)?;
        let resp = check_status(resp).await?;

        let data: Value = resp.json().await.map_err(|e| {
            AdapterError::Decode(format!("gas publications json decode failed: {e}"))
        })?;
        let publications = data.as_array().cloned().ok_or_else(|| {
            AdapterError::Decode("expected array of publications".to_string())
        })?;

        let mut rows: Vec<JsonMap> = Vec::new();
        for publication in publications {
            let pub_id = publication.get("publicationId").cloned().unwrap_or(Value::Null);
            let pub_name = publication
                .get("publicationName")
                .cloned()
                .unwrap_or(Value::Null);
            let entries = publication
                .get("publications")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for entry in entries {
                let mut row = JsonMap::new();
                row.insert("publicationId".to_string(), pub_id.clone());
                row.insert("publicationName".to_string(), pub_name.clone());
                for key in ["applicableFor", "value", "qualityIndicator", "generatedTimeStamp"] {
                    row.insert(
                        key.to_string(),
                        entry.get(key).cloned().unwrap_or(Value::Null),
                    );
                }
                rows.push(row);
            }
        }

        Ok(RawPayload::Rows(rows))
    }

    fn parse(&self, raw: &RawPayload) -> Result<Vec<JsonMap>, AdapterError> {
        match raw {
            RawPayload::Rows(rows) => Ok(rows.clone()),
            RawPayload::Document(_) => Err(AdapterError::Decode(
                "GAS_PUBLICATIONS adapter expects a row batch from fetch".to_string(),
            )),
        }
    }

    fn normalize(&self, record: &JsonMap) -> Vec<Normalized> {
        let Some(value) = record.get("value").and_then(|v| lenient_f64(v)) else {
            return Vec::new();
        };
        let pub_id = match record.get("publicationId") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Vec::new(),
        };
        let Some(ts) = record
            .get("applicableFor")
            .and_then(Value::as_str)
            .and_then(parse_utc)
        else {
            return Vec::new();
        };

        let series_id = make_series_id(DATASET_ID, &[&pub_id]);
        let quality_flag = record
            .get("qualityIndicator")
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
            if parts.len() < 3 {
                continue;
            }
            let pub_id = parts[parts.len() - 1];
            out.push(SeriesMeta {
                series_id: obs.series_id.clone(),
                source: SOURCE_NATIONAL_GAS.to_string(),
                dataset_id: DATASET_ID.to_string(),
                data_item: pub_id.to_string(),
                description: format!("Publication {pub_id}"),
                unit: "UNKNOWN".to_string(),
                frequency: "daily".to_string(),
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
// Tests
// ---------------------------------------------------------------------------
