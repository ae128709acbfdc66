//! Axum REST API handlers

use std::sync::Arc;

use anyhow::{bail, Context};
use axum::{
    Router,
    body::Bytes,
    routing::{get, post},
    extract::{State, DefaultBodyLimit},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{Config, CorsConfig};
use crate::engine::{FeatureVector, ValidationErrors};
use crate::service::PredictionService;

use super::dto::*;

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub reject_unknown_fields: bool,
}

impl AppState {
    pub fn new(service: Arc<PredictionService>, config: &Config) -> Self {
        Self {
            service,
            reject_unknown_fields: config.validation.reject_unknown_fields,
        }
    }
}

/// Create the REST API router
pub fn create_rest_router(state: Arc<AppState>, config: &Config) -> anyhow::Result<Router> {
    let cors = cors_layer(&config.cors)?;

    Ok(Router::new()
        .route("/health", get(health_handler))
        .route("/predict", post(predict_handler))
        // Middleware
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// CORS for the configured front-end origins, with credentials.
///
/// Credentials rule out wildcard methods and headers, so both are mirrored
/// from the preflight request instead.
pub fn cors_layer(config: &CorsConfig) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::with_capacity(config.allowed_origins.len());
    for origin in &config.allowed_origins {
        if origin.trim() == "*" {
            bail!("wildcard CORS origin cannot be used with credentials");
        }
        let value = HeaderValue::from_str(origin.trim())
            .with_context(|| format!("invalid CORS origin '{}'", origin))?;
        origins.push(value);
    }

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

/// Handler failure, rendered as a JSON error body
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request: 422 with per-field detail
    Validation(ValidationErrors),
    /// Scaler or model failed on valid input: sanitized 500, details stay in the log
    Inference,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ValidationErrorResponse { detail: errors.0 }),
            )
                .into_response(),
            ApiError::Inference => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Internal server error", "INFERENCE_FAILED")),
            )
                .into_response(),
        }
    }
}

/// Classify one tumor sample
async fn predict_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    let request_id = Uuid::new_v4();

    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        debug!(%request_id, "Rejected undecodable body: {}", e);
        ApiError::Validation(ValidationErrors::json_invalid(&e.to_string()))
    })?;

    let features = FeatureVector::from_json(&payload, state.reject_unknown_fields).map_err(|e| {
        debug!(%request_id, "Rejected invalid body: {}", e);
        ApiError::Validation(e)
    })?;

    let result = state.service.predict(features).await.map_err(|e| {
        error!(%request_id, "Prediction failed: {:#}", e);
        ApiError::Inference
    })?;

    info!(%request_id, prediction = result.prediction, "Classified as {}", result.verdict.as_str());
    Ok(Json(result.into()))
}

/// Health check
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
