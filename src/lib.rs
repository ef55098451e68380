//! Score Service - model scoring endpoint with drift-monitoring telemetry
//!
//! Loads a trained regression model once at startup, scores batches of
//! feature rows posted as JSON, and reports inputs, outputs and the combined
//! view to three correlated telemetry channels.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::config::{Settings, TelemetryPolicy};
pub use crate::core::{FeatureTable, LinearRegression, Predictor, ScoreError, Scorer};
pub use crate::services::{Collector, Collectors, CorrelationContext};
