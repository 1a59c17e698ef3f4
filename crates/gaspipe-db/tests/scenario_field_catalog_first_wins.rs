// Field discovery catalogs each dataset's raw top-level fields once; replays
// and type drift never change the first catalog row.
//
// DB-backed test, skipped if GASPIPE_DATABASE_URL is not set.

use anyhow::Result;
use serde_json::json;
use sqlx::Row;
use uuid::Uuid;

use gaspipe_model::JsonMap;

fn row(value: serde_json::Value) -> JsonMap {
    value.as_object().cloned().expect("object")
}

fn unique_dataset() -> String {
    format!("FC_{}", Uuid::new_v4().simple())
}

#[tokio::test]
async fn discovered_fields_have_types_nullability_and_examples() -> Result<()> {
    if std::env::var(gaspipe_db::ENV_DB_URL).is_err() {
        eprintln!("SKIP: GASPIPE_DATABASE_URL not set");
        return Ok(());
    }
    let pool = gaspipe_db::testkit_db_pool().await?;
    let dataset = unique_dataset();

    let rows = vec![
        row(json!({"siteId": 77, "cv": 39.5, "note": null, "ok": true})),
        row(json!({"siteId": 78, "cv": "39.9", "note": "text", "ok": false})),
    ];
    gaspipe_db::insert_raw_rows(&pool, &dataset, "NATIONAL_GAS", &rows, None).await?;

    let fields = gaspipe_db::discover_fields(&pool, &dataset).await?;
    assert_eq!(fields, 4);

    let catalog = sqlx::query(
        "select field_name, inferred_type, nullable, example_value
         from field_catalog where dataset_id = $1 order by field_name",
    )
    .bind(&dataset)
    .fetch_all(&pool)
    .await?;
    assert_eq!(catalog.len(), 4);

    let by_name = |name: &str| {
        catalog
            .iter()
            .find(|r| r.get::<String, _>("field_name") == name)
            .expect("field catalogued")
    };

    // cv was seen as float and string: comma-joined, alphabetically sorted.
    assert_eq!(by_name("cv").get::<String, _>("inferred_type"), "float,string");
    assert_eq!(by_name("siteId").get::<String, _>("inferred_type"), "integer");
    assert_eq!(by_name("ok").get::<String, _>("inferred_type"), "boolean");
    // note was null once: nullable, and its non-null type recorded.
    assert!(by_name("note").get::<bool, _>("nullable"));
    assert!(!by_name("siteId").get::<bool, _>("nullable"));
    assert_eq!(
        by_name("siteId").get::<Option<String>, _>("example_value").as_deref(),
        Some("77")
    );

    Ok(())
}

#[tokio::test]
async fn replay_with_drifted_types_keeps_first_catalog_row() -> Result<()> {
    if std::env::var(gaspipe_db::ENV_DB_URL).is_err() {
        eprintln!("SKIP: GASPIPE_DATABASE_URL not set");
        return Ok(());
    }
    let pool = gaspipe_db::testkit_db_pool().await?;
    let dataset = unique_dataset();

    let first = vec![row(json!({"cv": 39.5}))];
    gaspipe_db::insert_raw_rows(&pool, &dataset, "NATIONAL_GAS", &first, None).await?;
    gaspipe_db::discover_fields(&pool, &dataset).await?;

    // Upstream drifts to strings; the catalog must not change.
    let second = vec![row(json!({"cv": "drifted"}))];
    gaspipe_db::insert_raw_rows(&pool, &dataset, "NATIONAL_GAS", &second, None).await?;
    gaspipe_db::discover_fields(&pool, &dataset).await?;

    let (inferred, example): (String, Option<String>) = sqlx::query_as(
        "select inferred_type, example_value
         from field_catalog where dataset_id = $1 and field_name = 'cv'",
    )
    .bind(&dataset)
    .fetch_one(&pool)
    .await?;

    assert_eq!(inferred, "float");
    assert_eq!(example.as_deref(), Some("39.5"));

    Ok(())
}

#[tokio::test]
async fn long_example_values_truncate_to_200_chars() -> Result<()> {
    if std::env::var(gaspipe_db::ENV_DB_URL).is_err() {
        eprintln!("SKIP: GASPIPE_DATABASE_URL not set");
        return Ok(());
    }
    let pool = gaspipe_db::testkit_db_pool().await?;
    let dataset = unique_dataset();

    let long = "x".repeat(500);
    let rows = vec![row(json!({"blob": long}))];
    gaspipe_db::insert_raw_rows(&pool, &dataset, "NATIONAL_GAS", &rows, None).await?;
    gaspipe_db::discover_fields(&pool, &dataset).await?;

    let (example,): (Option<String>,) = sqlx::query_as(
        "select example_value from field_catalog
         where dataset_id = $1 and field_name = 'blob'",
    )
    .bind(&dataset)
    .fetch_one(&pool)
    .await?;

    assert_eq!(example.map(|e| e.len()), Some(200));

    Ok(())
}
