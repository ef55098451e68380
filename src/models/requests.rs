use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a scoring request.
///
/// `data` stays untyped here: it may be a list of row objects or an object of
/// columns, and is turned into a feature table by the scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub data: Value,
}
