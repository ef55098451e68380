// Core scoring exports
pub mod model;
pub mod scorer;
pub mod table;

pub use model::{load_model, LinearRegression, ModelArtifact, ModelError, Predictor};
pub use scorer::{InitError, ScoreError, Scorer};
pub use table::{FeatureTable, TableError};
