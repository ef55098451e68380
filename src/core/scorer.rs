use crate::config::{Settings, TelemetryPolicy};
use crate::core::model::{load_model, ModelError, Predictor};
use crate::core::table::{FeatureTable, TableError};
use crate::services::telemetry::{CollectError, Collectors, CorrelationContext, TelemetryError};
use serde_json::Value;
use thiserror::Error;

/// Startup failures. Any of these stops the service before it serves a request.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to load model: {0}")]
    Model(#[from] ModelError),

    #[error("failed to set up telemetry: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("prediction column `{0}` is also a model feature")]
    PredictionColumnClash(String),
}

/// Failures scoped to a single scoring request
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid input table: {0}")]
    Table(#[from] TableError),

    #[error("inference failed: {0}")]
    Inference(#[from] ModelError),

    #[error("telemetry failed: {0}")]
    Telemetry(#[from] CollectError),
}

/// Everything a request needs, built once at startup and shared read-only.
///
/// # Request pipeline
/// 1. Parse the payload into a feature table
/// 2. Emit the inputs, which opens the request's correlation context
/// 3. Predict
/// 4. Append the prediction column
/// 5. Emit the prediction column alone
/// 6. Emit inputs and predictions together (feature attribution drift needs both in one record)
/// 7. Return the predictions in row order
pub struct Scorer {
    model: Box<dyn Predictor>,
    collectors: Collectors,
    prediction_column: String,
    policy: TelemetryPolicy,
}

impl Scorer {
    pub fn new(
        model: Box<dyn Predictor>,
        collectors: Collectors,
        prediction_column: impl Into<String>,
        policy: TelemetryPolicy,
    ) -> Self {
        Self {
            model,
            collectors,
            prediction_column: prediction_column.into(),
            policy,
        }
    }

    /// Load the model and register the telemetry channels
    pub fn init(settings: &Settings) -> Result<Self, InitError> {
        let path = settings.model.artifact_path();
        tracing::info!("Loading model from {}", path.display());
        let model = load_model(&path)?;

        let column = &settings.model.prediction_column;
        if model.feature_names().iter().any(|f| f == column) {
            return Err(InitError::PredictionColumnClash(column.clone()));
        }

        let collectors = Collectors::from_settings(&settings.telemetry)?;
        tracing::info!(
            "Telemetry channels registered: {:?}, {:?}, {:?}",
            collectors.inputs,
            collectors.outputs,
            collectors.inputs_outputs
        );

        Ok(Self::new(
            model,
            collectors,
            settings.model.prediction_column.clone(),
            settings.telemetry.policy,
        ))
    }

    pub fn model(&self) -> &dyn Predictor {
        self.model.as_ref()
    }

    pub fn prediction_column(&self) -> &str {
        &self.prediction_column
    }

    /// Score a raw request body
    pub async fn score(&self, raw: &[u8]) -> Result<Vec<f64>, ScoreError> {
        let request: Value = serde_json::from_slice(raw)?;
        self.score_value(&request).await
    }

    /// Score an already parsed request body
    pub async fn score_value(&self, request: &Value) -> Result<Vec<f64>, ScoreError> {
        let inputs = FeatureTable::from_request(request)?;
        tracing::debug!(
            "Scoring {} rows with columns {:?}",
            inputs.num_rows(),
            inputs.columns()
        );

        let context = self
            .emit(self.collectors.inputs.collect(&inputs, None).await)?;

        let predictions = self.model.predict(&inputs)?;
        debug_assert_eq!(predictions.len(), inputs.num_rows());

        let combined = inputs.with_column(&self.prediction_column, &predictions)?;
        let outputs = combined.project(&[self.prediction_column.as_str()])?;

        self.emit(self.collectors.outputs.collect(&outputs, Some(&context)).await)?;
        self.emit(
            self.collectors
                .inputs_outputs
                .collect(&combined, Some(&context))
                .await,
        )?;

        tracing::debug!("Predictions for {}: {:?}", context, predictions);
        Ok(predictions)
    }

    /// Apply the telemetry policy to one emission result
    fn emit(
        &self,
        result: Result<CorrelationContext, CollectError>,
    ) -> Result<CorrelationContext, ScoreError> {
        match result {
            Ok(context) => Ok(context),
            Err(e) if self.policy == TelemetryPolicy::BestEffort => {
                tracing::warn!("Telemetry emission failed, continuing: {}", e);
                Ok(e.context)
            }
            Err(e) => {
                tracing::error!("Telemetry emission failed: {}", e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelemetrySettings;
    use crate::core::model::LinearRegression;
    use crate::services::telemetry::{TelemetryRecord, TelemetrySink};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Fails on one channel and records the context of every attempt
    struct FailingSink {
        fail_on: &'static str,
        attempts: Mutex<Vec<(String, CorrelationContext)>>,
    }

    impl FailingSink {
        fn on(channel: &'static str) -> Arc<Self> {
            Arc::new(Self {
                fail_on: channel,
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> Vec<(String, CorrelationContext)> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TelemetrySink for FailingSink {
        async fn send(&self, record: &TelemetryRecord<'_>) -> Result<(), TelemetryError> {
            self.attempts
                .lock()
                .unwrap()
                .push((record.channel.to_string(), record.correlation_id));
            if record.channel == self.fail_on {
                return Err(TelemetryError::ApiError("collector down".into()));
            }
            Ok(())
        }

        fn kind(&self) -> &'static str {
            "failing"
        }
    }

    fn scorer(policy: TelemetryPolicy, sink: Arc<FailingSink>) -> Scorer {
        let model = LinearRegression::new(
            vec!["feature_a".into(), "feature_b".into()],
            vec![1.0, 1.0],
            0.0,
        );
        let collectors = Collectors::with_sink(&TelemetrySettings::default(), sink);
        Scorer::new(Box::new(model), collectors, "Predicted_Temperature", policy)
    }

    const BODY: &[u8] = br#"{"data": [{"feature_a": 1.0, "feature_b": 2.0}]}"#;

    #[tokio::test]
    async fn test_best_effort_keeps_context_after_inputs_failure() {
        let sink = FailingSink::on("model_inputs");
        let predictions = scorer(TelemetryPolicy::BestEffort, sink.clone())
            .score(BODY)
            .await
            .unwrap();
        assert_eq!(predictions, vec![3.0]);

        let attempts = sink.attempts();
        let channels: Vec<&str> = attempts.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(channels, vec!["model_inputs", "model_outputs", "model_inputs_outputs"]);

        let context = attempts[0].1;
        assert!(attempts.iter().all(|(_, ctx)| *ctx == context));
    }

    #[tokio::test]
    async fn test_strict_fails_request_on_inputs_failure() {
        let sink = FailingSink::on("model_inputs");
        let err = scorer(TelemetryPolicy::Strict, sink.clone()).score(BODY).await.unwrap_err();
        match err {
            ScoreError::Telemetry(e) => assert_eq!(e.channel, "model_inputs"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sink.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_strict_fails_request_on_outputs_failure() {
        let sink = FailingSink::on("model_outputs");
        let err = scorer(TelemetryPolicy::Strict, sink.clone()).score(BODY).await.unwrap_err();
        match err {
            ScoreError::Telemetry(e) => {
                assert_eq!(e.channel, "model_outputs");
                assert_eq!(e.context, sink.attempts()[0].1);
            }
            other => panic!("unexpected error: {other}"),
        }
        // the combined record is never sent once the request has failed
        assert_eq!(sink.attempts().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_json_is_request_error() {
        let err = scorer(TelemetryPolicy::BestEffort, FailingSink::on("model_inputs"))
            .score(b"{data:")
            .await
            .unwrap_err();
        assert!(matches!(err, ScoreError::InvalidJson(_)));
    }
}
