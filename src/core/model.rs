use crate::core::table::{FeatureTable, TableError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use validator::Validate;

/// File name looked up when the artifact path is a directory
pub const ARTIFACT_FILE: &str = "model.json";

/// Errors raised while loading a model or running inference
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model artifact not found at {0}")]
    NotFound(PathBuf),

    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model artifact {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model artifact: {0}")]
    Invalid(String),

    #[error("input does not match model features (missing: {missing:?}, unexpected: {unexpected:?})")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("non-finite value in feature `{column}` at row {row}")]
    NonFiniteInput { column: String, row: usize },

    #[error("prediction for row {row} is not finite")]
    NonFiniteOutput { row: usize },

    #[error("table error: {0}")]
    Table(#[from] TableError),
}

/// A loaded model.
///
/// Implementations are shared read-only across every request worker, so
/// `predict` takes `&self` and the trait requires `Send + Sync`.
pub trait Predictor: Send + Sync {
    /// Human readable model name
    fn name(&self) -> &str;

    /// Features the model was trained on, in training order
    fn feature_names(&self) -> &[String];

    /// One prediction per row, in row order
    fn predict(&self, table: &FeatureTable) -> Result<Vec<f64>, ModelError>;
}

/// Serialized model bundle, tagged by flavor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "flavor", rename_all = "snake_case")]
pub enum ModelArtifact {
    LinearRegression(LinearRegression),
}

impl ModelArtifact {
    pub fn into_predictor(self) -> Result<Box<dyn Predictor>, ModelError> {
        match self {
            ModelArtifact::LinearRegression(model) => {
                model.check()?;
                Ok(Box::new(model))
            }
        }
    }
}

/// Load the model stored at `path`.
///
/// `path` may point at the JSON artifact itself or at a directory holding
/// `model.json`.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Box<dyn Predictor>, ModelError> {
    let path = path.as_ref();
    let file = if path.is_dir() {
        path.join(ARTIFACT_FILE)
    } else {
        path.to_path_buf()
    };

    if !file.exists() {
        return Err(ModelError::NotFound(file));
    }

    let bytes = std::fs::read(&file).map_err(|source| ModelError::Io {
        path: file.clone(),
        source,
    })?;
    let artifact: ModelArtifact =
        serde_json::from_slice(&bytes).map_err(|source| ModelError::Format {
            path: file.clone(),
            source,
        })?;

    let model = artifact.into_predictor()?;
    tracing::debug!(
        "Loaded model {} from {} ({} features)",
        model.name(),
        file.display(),
        model.feature_names().len()
    );
    Ok(model)
}

/// Ordinary least squares regression: `intercept + sum(coef_i * x_i)`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LinearRegression {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[validate(length(min = 1))]
    pub feature_names: Vec<String>,
    #[validate(length(min = 1))]
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

fn default_model_name() -> String { "linear_regression".to_string() }

impl LinearRegression {
    pub fn new(feature_names: Vec<String>, coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            name: default_model_name(),
            feature_names,
            coefficients,
            intercept,
        }
    }

    fn check(&self) -> Result<(), ModelError> {
        self.validate()
            .map_err(|e| ModelError::Invalid(e.to_string()))?;

        if self.coefficients.len() != self.feature_names.len() {
            return Err(ModelError::Invalid(format!(
                "{} coefficients for {} features",
                self.coefficients.len(),
                self.feature_names.len()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::Invalid("non-finite parameter".into()));
        }
        Ok(())
    }
}

impl Predictor for LinearRegression {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, table: &FeatureTable) -> Result<Vec<f64>, ModelError> {
        check_schema(&self.feature_names, table)?;

        let matrix = table.select_ordered(self.feature_names.as_slice())?;
        matrix
            .iter()
            .enumerate()
            .map(|(row, values)| {
                if let Some(col) = values.iter().position(|v| !v.is_finite()) {
                    return Err(ModelError::NonFiniteInput {
                        column: self.feature_names[col].clone(),
                        row,
                    });
                }
                let prediction = self
                    .coefficients
                    .iter()
                    .zip(values)
                    .map(|(c, x)| c * x)
                    .sum::<f64>()
                    + self.intercept;
                if !prediction.is_finite() {
                    return Err(ModelError::NonFiniteOutput { row });
                }
                Ok(prediction)
            })
            .collect()
    }
}

/// The table must carry exactly the model's features; column order is free.
pub fn check_schema(features: &[String], table: &FeatureTable) -> Result<(), ModelError> {
    let missing: Vec<String> = features
        .iter()
        .filter(|f| table.column_index(f).is_none())
        .cloned()
        .collect();
    let unexpected: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| !features.contains(c))
        .cloned()
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(ModelError::SchemaMismatch { missing, unexpected })
    }
}
