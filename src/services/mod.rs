// Service exports
pub mod telemetry;

pub use telemetry::{
    CollectError, Collector, Collectors, CorrelationContext, HttpSink, LogSink, TelemetryError,
    TelemetryRecord, TelemetrySink,
};
