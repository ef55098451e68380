use crate::config::TelemetrySettings;
use crate::core::FeatureTable;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when shipping records to a collector
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("collector returned error: {0}")]
    ApiError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A failed emission. The context is still handed back so later emissions
/// for the same request stay correlated.
#[derive(Debug, Error)]
#[error("failed to emit to `{channel}`: {source}")]
pub struct CollectError {
    pub channel: String,
    pub context: CorrelationContext,
    #[source]
    pub source: TelemetryError,
}

/// Correlation token tying the emissions of one request together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CorrelationContext(Uuid);

impl CorrelationContext {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl Default for CorrelationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One record as sent to a collector
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord<'a> {
    pub channel: &'a str,
    pub correlation_id: CorrelationContext,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub table: &'a FeatureTable,
}

/// Destination for telemetry records.
///
/// Sinks are shared by every request worker and must tolerate concurrent
/// `send` calls.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn send(&self, record: &TelemetryRecord<'_>) -> Result<(), TelemetryError>;

    /// Short label used in logs
    fn kind(&self) -> &'static str;
}

/// Posts records to `{endpoint}/{channel}` as JSON
pub struct HttpSink {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpSink {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TelemetryError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl TelemetrySink for HttpSink {
    async fn send(&self, record: &TelemetryRecord<'_>) -> Result<(), TelemetryError> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), record.channel);

        let mut request = self.client.post(&url).json(record);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            tracing::debug!("Collector rejected record for {}: {} - {}", record.channel, status, body);
            return Err(TelemetryError::ApiError(format!(
                "{} rejected record: {}",
                record.channel, status
            )));
        }

        tracing::trace!("Sent {} rows to {}", record.table.num_rows(), url);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "http"
    }
}

/// Writes records to the structured log under the `telemetry` target
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl TelemetrySink for LogSink {
    async fn send(&self, record: &TelemetryRecord<'_>) -> Result<(), TelemetryError> {
        let payload = serde_json::to_string(record)?;
        tracing::info!(
            target: "telemetry",
            channel = record.channel,
            correlation_id = %record.correlation_id,
            rows = record.table.num_rows(),
            "{}",
            payload
        );
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "log"
    }
}

/// A named telemetry channel
#[derive(Clone)]
pub struct Collector {
    name: String,
    sink: Arc<dyn TelemetrySink>,
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("name", &self.name)
            .field("sink", &self.sink.kind())
            .finish()
    }
}

impl Collector {
    pub fn new(name: impl Into<String>, sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            name: name.into(),
            sink,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emit `table` on this channel.
    ///
    /// Reuses `context` when given, otherwise starts a new one. The context
    /// used is returned either way.
    pub async fn collect(
        &self,
        table: &FeatureTable,
        context: Option<&CorrelationContext>,
    ) -> Result<CorrelationContext, CollectError> {
        let context = context.copied().unwrap_or_default();
        let record = TelemetryRecord {
            channel: &self.name,
            correlation_id: context,
            timestamp: Utc::now(),
            table,
        };

        match self.sink.send(&record).await {
            Ok(()) => Ok(context),
            Err(source) => Err(CollectError {
                channel: self.name.clone(),
                context,
                source,
            }),
        }
    }
}

/// The three channels every request reports to
#[derive(Debug, Clone)]
pub struct Collectors {
    pub inputs: Collector,
    pub outputs: Collector,
    pub inputs_outputs: Collector,
}

impl Collectors {
    /// Build the channels described by `settings`, all sharing one sink
    pub fn from_settings(settings: &TelemetrySettings) -> Result<Self, TelemetryError> {
        let sink: Arc<dyn TelemetrySink> = match &settings.endpoint {
            Some(endpoint) => Arc::new(HttpSink::new(
                endpoint.clone(),
                settings.api_key.clone(),
                Duration::from_secs(settings.timeout_secs),
            )?),
            None => Arc::new(LogSink),
        };

        Ok(Self::with_sink(settings, sink))
    }

    pub fn with_sink(settings: &TelemetrySettings, sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            inputs: Collector::new(settings.inputs_channel.clone(), sink.clone()),
            outputs: Collector::new(settings.outputs_channel.clone(), sink.clone()),
            inputs_outputs: Collector::new(settings.inputs_outputs_channel.clone(), sink),
        }
    }
}
