//! Field discovery: a per-dataset catalog of observed top-level payload
//! fields, built by scanning the raw store.
//!
//! The catalog is write-once per `(dataset_id, field_name)`: the first
//! discovered row wins, so downstream consumers see a stable shape even when
//! upstream types drift later.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::{PgPool, Row};

/// JSON type classifier for the field catalog.
pub fn infer_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "float"
            }
        }
        _ => "string",
    }
}

#[derive(Debug, Default)]
struct FieldStats {
    types: std::collections::BTreeSet<&'static str>,
    nulls: u64,
    example: Option<Value>,
}

/// Scan all raw events for a dataset and upsert the field catalog.
/// Returns the number of distinct fields observed.
pub async fn discover_fields(pool: &PgPool, dataset_id: &str) -> Result<u64> {
    let rows = sqlx::query(
        r#"
        select raw_payload
        from raw_events
        where dataset_id = $1
        "#,
    )
    .bind(dataset_id)
    .fetch_all(pool)
    .await
    .context("field discovery raw_events scan failed")?;

    // BTreeMap for a deterministic catalog write order.
    let mut stats: BTreeMap<String, FieldStats> = BTreeMap::new();

    for row in rows {
        let payload: Value = row.try_get("raw_payload")?;
        let Some(object) = payload.as_object() else {
            continue;
        };
        for (key, value) in object {
            let entry = stats.entry(key.clone()).or_default();
            if entry.example.is_none() {
                entry.example = Some(value.clone());
            }
            if value.is_null() {
                entry.nulls += 1;
            } else {
                entry.types.insert(infer_type(value));
            }
        }
    }

    for (field, meta) in &stats {
        let inferred = if meta.types.is_empty() {
            "null".to_string()
        } else {
            meta.types.iter().copied().collect::<Vec<_>>().join(",")
        };
        let nullable = meta.nulls > 0;
        let example = meta.example.as_ref().map(example_string);

        sqlx::query(
            r#"
            insert into field_catalog
                (dataset_id, field_name, inferred_type, nullable, example_value)
            values ($1, $2, $3, $4, $5)
            on conflict (dataset_id, field_name) do nothing
            "#,
        )
        .bind(dataset_id)
        .bind(field)
        .bind(&inferred)
        .bind(nullable)
        .bind(example)
        .execute(pool)
        .await
        .context("field_catalog upsert failed")?;
    }

    Ok(stats.len() as u64)
}

/// String form of an example value, truncated to 200 characters.
fn example_string(v: &Value) -> String {
    let s = match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    s.chars().take(200).collect()
}

/// Distinct dataset ids seen in the raw store.
pub async fn list_datasets(pool: &PgPool) -> Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        select distinct dataset_id
        from raw_events
        order by dataset_id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("list_datasets failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(row.try_get::<String, _>("dataset_id")?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn infer_type_classes() {
        assert_eq!(infer_type(&json!(null)), "null");
        assert_eq!(infer_type(&json!(true)), "boolean");
        assert_eq!(infer_type(&json!(42)), "integer");
        assert_eq!(infer_type(&json!(42.5)), "float");
        assert_eq!(infer_type(&json!("x")), "string");
        assert_eq!(infer_type(&json!([1, 2])), "string");
    }

    #[test]
    fn example_string_truncates_to_200_chars() {
        let long = "a".repeat(500);
        assert_eq!(example_string(&json!(long)).len(), 200);
        assert_eq!(example_string(&json!(12.5)), "12.5");
        assert_eq!(example_string(&json!({"k": 1})), r#"{"k":1}"#);
    }
}
