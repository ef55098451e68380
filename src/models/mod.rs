// Wire type exports
pub mod requests;
pub mod responses;

pub use requests::ScoreRequest;
pub use responses::{ErrorResponse, HealthResponse};
