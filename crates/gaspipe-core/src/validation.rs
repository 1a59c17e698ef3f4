//! Validation layer, executed in core.
//!
//! Adapters declare rules (required fields, min row count, date range); the
//! orchestrator runs the checks against the normalized batch and fails the
//! run on the first violation. Dataset-config overrides win over adapter
//! defaults, rule by rule.

use std::fmt;

use serde_json::Value;
use tracing::debug;

use gaspipe_adapters::{DatasetAdapter, ValidationConfig};
use gaspipe_model::Normalized;

/// Raised when a validation rule fails; the orchestrator marks the run
/// FAILED and re-raises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: {}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Effective rules: adapter defaults with dataset-config overrides applied
/// rule by rule.
fn merge_rules(base: ValidationConfig, overrides: Option<&ValidationConfig>) -> ValidationConfig {
    let Some(overrides) = overrides else {
        return base;
    };
    ValidationConfig {
        required_fields: if overrides.required_fields.is_empty() {
            base.required_fields
        } else {
            overrides.required_fields.clone()
        },
        min_row_count: overrides.min_row_count.or(base.min_row_count),
        date_range: overrides.date_range.clone().or(base.date_range),
    }
}

/// Run the effective validation rules over a normalized batch.
/// No rules → pass.
pub fn validate(
    normalized: &[Normalized],
    adapter: &dyn DatasetAdapter,
    overrides: Option<&ValidationConfig>,
) -> Result<(), ValidationError> {
    let rules = merge_rules(adapter.validation_config(), overrides);
    if rules.is_empty() {
        return Ok(());
    }

    if let Some(min_count) = rules.min_row_count {
        if normalized.len() < min_count {
            return Err(ValidationError::new(format!(
                "min_row_count={min_count} but got {} normalized records",
                normalized.len()
            )));
        }
    }

    if !rules.required_fields.is_empty() && !normalized.is_empty() {
        for (i, record) in normalized.iter().enumerate() {
            let value = serde_json::to_value(record).map_err(|e| {
                ValidationError::new(format!("record at index {i} is not serializable: {e}"))
            })?;
            let Some(object) = value.as_object() else {
                return Err(ValidationError::new(format!(
                    "record at index {i} is not an object"
                )));
            };
            let missing: Vec<&str> = rules
                .required_fields
                .iter()
                .map(String::as_str)
                .filter(|field| matches!(object.get(*field), None | Some(Value::Null)))
                .collect();
            if !missing.is_empty() {
                return Err(ValidationError::new(format!(
                    "record at index {i} missing required fields: {missing:?}"
                )));
            }
        }
    }

    if let Some(range) = &rules.date_range {
        if !normalized.is_empty() && (range.min_date.is_some() || range.max_date.is_some()) {
            let time_field = adapter.time_field();
            for (i, record) in normalized.iter().enumerate() {
                let Some(ts) = record.time_for_field(time_field) else {
                    continue;
                };
                if let Some(min) = range.min_date {
                    if ts < min {
                        return Err(ValidationError::new(format!(
                            "record at index {i}: {time_field} {ts} before min_date {min}"
                        )));
                    }
                }
                if let Some(max) = range.max_date {
                    if ts > max {
                        return Err(ValidationError::new(format!(
                            "record at index {i}: {time_field} {ts} after max_date {max}"
                        )));
                    }
                }
            }
        }
    }

    debug!(records = normalized.len(), "validation passed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gaspipe_adapters::{AdapterError, DateRange};
    use gaspipe_model::{
        parse_utc, FetchParams, JsonMap, ObservationRecord, RawPayload, SeriesMeta,
    };

    struct RuleAdapter {
        rules: ValidationConfig,
    }

    #[async_trait]
    impl DatasetAdapter for RuleAdapter {
        fn dataset_id(&self) -> &'static str {
            "RULES"
        }

        fn source(&self) -> &'static str {
            "TEST"
        }

        async fn fetch(&self, _params: &FetchParams) -> Result<RawPayload, AdapterError> {
            Ok(RawPayload::Rows(Vec::new()))
        }

        fn parse(&self, _raw: &RawPayload) -> Result<Vec<JsonMap>, AdapterError> {
            Ok(Vec::new())
        }

        fn normalize(&self, _record: &JsonMap) -> Vec<Normalized> {
            Vec::new()
        }

        fn define_series(&self, _normalized: &[Normalized]) -> Vec<SeriesMeta> {
            Vec::new()
        }

        fn time_field(&self) -> &'static str {
            "observation_time"
        }

        fn validation_config(&self) -> ValidationConfig {
            self.rules.clone()
        }
    }

    fn obs(ts: &str, quality: Option<&str>) -> Normalized {
        Normalized::Observation(ObservationRecord {
            series_id: "NG_RULES_A".to_string(),
            observation_time: parse_utc(ts).unwrap(),
            value: 1.0,
            quality_flag: quality.map(str::to_string),
            raw_payload: None,
        })
    }

    #[test]
    fn no_rules_passes() {
        let adapter = RuleAdapter {
            rules: ValidationConfig::default(),
        };
        assert!(validate(&[], &adapter, None).is_ok());
    }

    #[test]
    fn min_row_count_violation_names_the_rule() {
        let adapter = RuleAdapter {
            rules: ValidationConfig {
                min_row_count: Some(10),
                ..Default::default()
            },
        };
        let batch = vec![obs("2024-03-01T12:00:00Z", None); 3];
        let err = validate(&batch, &adapter, None).unwrap_err();
        assert!(err.to_string().contains("min_row_count=10"));
        assert!(err.to_string().contains("got 3"));
    }

    #[test]
    fn required_fields_checks_null_as_missing() {
        let adapter = RuleAdapter {
            rules: ValidationConfig {
                required_fields: vec!["series_id".to_string(), "quality_flag".to_string()],
                ..Default::default()
            },
        };
        let ok = vec![obs("2024-03-01T12:00:00Z", Some("ACTUAL"))];
        assert!(validate(&ok, &adapter, None).is_ok());

        let missing = vec![obs("2024-03-01T12:00:00Z", None)];
        let err = validate(&missing, &adapter, None).unwrap_err();
        assert!(err.to_string().contains("index 0"));
        assert!(err.to_string().contains("quality_flag"));
    }

    #[test]
    fn date_range_bounds_are_inclusive() {
        let adapter = RuleAdapter {
            rules: ValidationConfig {
                date_range: Some(DateRange {
                    min_date: parse_utc("2024-03-01T00:00:00Z"),
                    max_date: parse_utc("2024-03-02T00:00:00Z"),
                }),
                ..Default::default()
            },
        };

        let inside = vec![obs("2024-03-01T12:00:00Z", None)];
        assert!(validate(&inside, &adapter, None).is_ok());

        let on_bound = vec![obs("2024-03-02T00:00:00Z", None)];
        assert!(validate(&on_bound, &adapter, None).is_ok());

        let before = vec![obs("2024-02-28T00:00:00Z", None)];
        let err = validate(&before, &adapter, None).unwrap_err();
        assert!(err.to_string().contains("before min_date"));

        let after = vec![obs("2024-03-03T00:00:00Z", None)];
        let err = validate(&after, &adapter, None).unwrap_err();
        assert!(err.to_string().contains("after max_date"));
    }

    #[test]
    fn overrides_win_rule_by_rule() {
        let adapter = RuleAdapter {
            rules: ValidationConfig {
                min_row_count: Some(5),
                ..Default::default()
            },
        };
        let overrides = ValidationConfig {
            min_row_count: Some(1),
            ..Default::default()
        };
        let batch = vec![obs("2024-03-01T12:00:00Z", None); 2];
        assert!(validate(&batch, &adapter, Some(&overrides)).is_ok());
        assert!(validate(&batch, &adapter, None).is_err());
    }
}
