// Criterion benchmarks for Score Service

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use score_service::config::{TelemetryPolicy, TelemetrySettings};
use score_service::core::{FeatureTable, LinearRegression, Predictor, Scorer};
use score_service::services::{Collectors, LogSink};
use serde_json::{json, Value};
use std::sync::Arc;

const FEATURES: [&str; 4] = ["humidity", "pressure", "wind_speed", "cloud_cover"];

fn create_request(rows: usize) -> Value {
    let rows: Vec<Value> = (0..rows)
        .map(|i| {
            json!({
                "humidity": (i % 100) as f64 / 100.0,
                "pressure": 990.0 + (i % 40) as f64,
                "wind_speed": (i % 25) as f64,
                "cloud_cover": (i % 8) as f64 / 8.0,
            })
        })
        .collect();
    json!({ "data": rows })
}

fn create_model() -> LinearRegression {
    LinearRegression::new(
        FEATURES.iter().map(|f| f.to_string()).collect(),
        vec![-6.5, 0.02, -0.3, -2.0],
        4.0,
    )
}

fn bench_table_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_parsing");

    for size in [10, 100, 1000].iter() {
        let request = create_request(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| FeatureTable::from_request(black_box(&request)).unwrap());
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let model = create_model();
    let table = FeatureTable::from_request(&create_request(1000)).unwrap();

    c.bench_function("predict_1000_rows", |b| {
        b.iter(|| model.predict(black_box(&table)).unwrap());
    });
}

fn bench_score_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_request");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    // Leave the log sink without a subscriber so only scoring is measured
    let collectors = Collectors::with_sink(&TelemetrySettings::default(), Arc::new(LogSink));
    let scorer = Scorer::new(
        Box::new(create_model()),
        collectors,
        "Predicted_Temperature",
        TelemetryPolicy::BestEffort,
    );

    for size in [10, 100, 1000].iter() {
        let body = serde_json::to_vec(&create_request(*size)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| runtime.block_on(scorer.score(black_box(&body))).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_table_parsing, bench_prediction, bench_score_request);
criterion_main!(benches);
