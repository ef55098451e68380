// Unit tests for Score Service

use score_service::core::{
    model::{check_schema, load_model, ModelArtifact},
    FeatureTable, LinearRegression, ModelError, Predictor, TableError,
};
use score_service::services::{Collector, LogSink};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_table_from_request_rows() {
    let table = FeatureTable::from_request(&json!({
        "data": [
            {"humidity": 0.41, "pressure": 1013.2, "wind": 3.0},
            {"humidity": 0.52, "pressure": 1009.8, "wind": 5.5},
        ]
    }))
    .unwrap();

    assert_eq!(table.num_rows(), 2);
    assert_eq!(table.num_columns(), 3);
    assert_eq!(table.column("wind"), Some(vec![3.0, 5.5]));
}

#[test]
fn test_table_rejects_nested_values() {
    let err = FeatureTable::from_json(&json!([{"a": [1, 2]}])).unwrap_err();
    assert!(matches!(err, TableError::NonNumeric { kind: "list", .. }));
}

#[test]
fn test_null_cell_fails_at_inference_not_parse() {
    let table = FeatureTable::from_json(&json!([{"a": null}])).unwrap();
    let model = LinearRegression::new(vec!["a".into()], vec![1.0], 0.0);

    assert!(matches!(
        model.predict(&table),
        Err(ModelError::NonFiniteInput { row: 0, .. })
    ));
}

#[test]
fn test_intercept_only_contribution() {
    let table = FeatureTable::from_json(&json!([{"a": 0.0}, {"a": 2.0}])).unwrap();
    let model = LinearRegression::new(vec!["a".into()], vec![3.0], -1.0);

    assert_eq!(model.predict(&table).unwrap(), vec![-1.0, 5.0]);
}

#[test]
fn test_check_schema_accepts_reordered_columns() {
    let table = FeatureTable::from_json(&json!([{"b": 1.0, "a": 2.0}])).unwrap();
    assert!(check_schema(&["a".to_string(), "b".to_string()], &table).is_ok());
}

#[test]
fn test_artifact_rejects_unknown_flavor() {
    let result: Result<ModelArtifact, _> = serde_json::from_value(json!({
        "flavor": "gradient_boosting",
        "trees": []
    }));
    assert!(result.is_err());
}

#[test]
fn test_load_model_from_file_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model");
    std::fs::write(
        &path,
        r#"{"flavor":"linear_regression","feature_names":["x"],"coefficients":[2.0]}"#,
    )
    .unwrap();

    let model = load_model(&path).unwrap_or_else(|e| panic!("load failed: {e}"));
    assert_eq!(model.name(), "linear_regression");
    assert_eq!(model.feature_names(), &["x".to_string()]);
}

#[test]
fn test_load_model_rejects_invalid_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    std::fs::write(
        &path,
        r#"{"flavor":"linear_regression","feature_names":["x","y"],"coefficients":[2.0]}"#,
    )
    .unwrap();

    assert!(matches!(load_model(&path), Err(ModelError::Invalid(_))));
}

#[test]
fn test_collector_mints_context_when_none_given() {
    let collector = Collector::new("model_inputs", Arc::new(LogSink));
    let table = FeatureTable::from_json(&json!([{"a": 1.0}])).unwrap();

    let first = tokio_test::block_on(collector.collect(&table, None)).unwrap();
    let second = tokio_test::block_on(collector.collect(&table, None)).unwrap();
    let reused = tokio_test::block_on(collector.collect(&table, Some(&first))).unwrap();

    assert_ne!(first, second);
    assert_eq!(first, reused);
}
