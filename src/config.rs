use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Platform-provided variable locating the deployed model bundle
pub const MODEL_DIR_ENV: &str = "AZUREML_MODEL_DIR";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub model: ModelSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5001 }
fn default_max_payload_bytes() -> usize { 10 * 1024 * 1024 }

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    /// Root of the deployed bundle; the model itself lives at `<base_dir>/model`
    pub base_dir: PathBuf,
    #[serde(default = "default_prediction_column")]
    pub prediction_column: String,
}

impl ModelSettings {
    pub fn artifact_path(&self) -> PathBuf {
        self.base_dir.join("model")
    }
}

fn default_prediction_column() -> String { "Predicted_Temperature".to_string() }

/// What to do with a request when a telemetry emission fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryPolicy {
    /// Log the failure and keep serving the request
    #[default]
    BestEffort,
    /// Fail the request
    Strict,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    /// Collector base URL. Records go to the log when unset.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_telemetry_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub policy: TelemetryPolicy,
    #[serde(default = "default_inputs_channel")]
    pub inputs_channel: String,
    #[serde(default = "default_outputs_channel")]
    pub outputs_channel: String,
    #[serde(default = "default_inputs_outputs_channel")]
    pub inputs_outputs_channel: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_telemetry_timeout(),
            policy: TelemetryPolicy::default(),
            inputs_channel: default_inputs_channel(),
            outputs_channel: default_outputs_channel(),
            inputs_outputs_channel: default_inputs_outputs_channel(),
        }
    }
}

fn default_telemetry_timeout() -> u64 { 10 }
fn default_inputs_channel() -> String { "model_inputs".to_string() }
fn default_outputs_channel() -> String { "model_outputs".to_string() }
fn default_inputs_outputs_channel() -> String { "model_inputs_outputs".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with SCORE__)
    /// 5. `AZUREML_MODEL_DIR` for the model root
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., SCORE__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("SCORE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        apply_platform_overrides(settings, std::env::var(MODEL_DIR_ENV).ok())?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("SCORE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        apply_platform_overrides(settings, std::env::var(MODEL_DIR_ENV).ok())?.try_deserialize()
    }
}

/// The hosting platform announces the model root through its own variable,
/// which wins over anything in files or SCORE__ variables.
fn apply_platform_overrides(settings: Config, model_dir: Option<String>) -> Result<Config, ConfigError> {
    match model_dir {
        Some(dir) if !dir.is_empty() => Config::builder()
            .add_source(settings)
            .set_override("model.base_dir", dir)?
            .build(),
        _ => Ok(settings),
    }
}
