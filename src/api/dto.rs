//! REST API request/response data transfer objects

use serde::Serialize;

use crate::engine::features::FieldError;
use crate::service::PredictionResult;

/// Predict response
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: i64,
    pub result: String,
    pub message: String,
}

impl From<PredictionResult> for PredictResponse {
    fn from(r: PredictionResult) -> Self {
        Self {
            prediction: r.prediction,
            result: r.verdict.as_str().to_string(),
            message: r.message,
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Validation error response (422)
#[derive(Debug, Serialize)]
pub struct ValidationErrorResponse {
    pub detail: Vec<FieldError>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
        }
    }
}
