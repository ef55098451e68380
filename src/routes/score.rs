use actix_web::{http::StatusCode, web, HttpResponse, Responder, ResponseError};
use crate::core::{ModelError, ScoreError, Scorer};
use crate::models::{ErrorResponse, HealthResponse};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub scorer: Arc<Scorer>,
}

/// Configure the scoring routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/score", web::post().to(score));
}

impl ScoreError {
    fn kind(&self) -> &'static str {
        match self {
            ScoreError::InvalidJson(_) => "invalid_json",
            ScoreError::Table(_) => "invalid_input",
            ScoreError::Inference(ModelError::SchemaMismatch { .. }) => "schema_mismatch",
            ScoreError::Inference(_) => "inference_failed",
            ScoreError::Telemetry(_) => "telemetry_failed",
        }
    }
}

impl ResponseError for ScoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            ScoreError::InvalidJson(_) | ScoreError::Table(_) => StatusCode::BAD_REQUEST,
            ScoreError::Inference(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ScoreError::Telemetry(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let model = state.scorer.model();

    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: model.name().to_string(),
        feature_count: model.feature_names().len(),
        timestamp: chrono::Utc::now(),
    })
}

/// Scoring endpoint
///
/// POST /score
///
/// Request body:
/// ```json
/// {
///   "data": [{"feature_a": 1.0, "feature_b": 2.0}]
/// }
/// ```
///
/// Responds with one prediction per row, in row order.
async fn score(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ScoreError> {
    match state.scorer.score(&body).await {
        Ok(predictions) => {
            tracing::debug!("Returning {} predictions", predictions.len());
            Ok(HttpResponse::Ok().json(predictions))
        }
        Err(e) => {
            tracing::info!("Scoring request rejected: {}", e);
            Err(e)
        }
    }
}
