//! HTTP contract tests for the REST API

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use ndarray::{Array1, ArrayView1};
use serde_json::{json, Value};
use tower::ServiceExt;

use tumor_classifier::api::{create_rest_router, AppState};
use tumor_classifier::config::{ArtifactsConfig, Config};
use tumor_classifier::engine::{Artifacts, Classifier, LabeledRecord, Scaler};
use tumor_classifier::service::PredictionService;

const FRONTEND: &str = "http://localhost:5173";

fn malignant_body() -> Value {
    json!({
        "radius_mean": 17.99,
        "texture_mean": 10.38,
        "perimeter_mean": 122.8,
        "area_mean": 1001.0,
        "smoothness_mean": 0.1184,
        "compactness_mean": 0.2776,
        "concavity_mean": 0.3001,
        "concave_points_mean": 0.1471,
        "symmetry_mean": 0.2419,
        "fractal_dimension_mean": 0.07871
    })
}

fn benign_body() -> Value {
    json!({
        "radius_mean": 13.54,
        "texture_mean": 14.36,
        "perimeter_mean": 87.46,
        "area_mean": 566.3,
        "smoothness_mean": 0.09779,
        "compactness_mean": 0.08129,
        "concavity_mean": 0.06664,
        "concave_points_mean": 0.04781,
        "symmetry_mean": 0.1885,
        "fractal_dimension_mean": 0.05766
    })
}

fn router_with(artifacts: Artifacts, config: &Config) -> Router {
    let service = Arc::new(PredictionService::new(artifacts));
    let state = Arc::new(AppState::new(service, config));
    create_rest_router(state, config).unwrap()
}

fn bundled_router() -> Router {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let artifacts = Artifacts::load(&ArtifactsConfig {
        model: root.join("models/model.json"),
        scaler: root.join("models/scaler.json"),
    })
    .unwrap();
    router_with(artifacts, &Config::default())
}

fn fake_router(model: impl Classifier + 'static) -> Router {
    let artifacts = Artifacts::from_parts(Arc::new(IdentityScaler), Arc::new(model)).unwrap();
    router_with(artifacts, &Config::default())
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

struct IdentityScaler;

impl Scaler for IdentityScaler {
    fn n_features_out(&self) -> usize {
        10
    }

    fn transform(&self, record: &LabeledRecord) -> Result<Array1<f64>> {
        Ok(record.iter().map(|(_, v)| v).collect())
    }
}

struct FailingModel;

impl Classifier for FailingModel {
    fn n_features_in(&self) -> usize {
        10
    }

    fn classes(&self) -> &[i64] {
        &[0, 1]
    }

    fn predict(&self, _x: ArrayView1<'_, f64>) -> Result<i64> {
        bail!("secret internal detail: column mismatch")
    }
}

/// Always malignant, after a delay
struct SlowModel(Duration);

impl Classifier for SlowModel {
    fn n_features_in(&self) -> usize {
        10
    }

    fn classes(&self) -> &[i64] {
        &[0, 1]
    }

    fn predict(&self, _x: ArrayView1<'_, f64>) -> Result<i64> {
        std::thread::sleep(self.0);
        Ok(1)
    }
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(bundled_router(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_malignant_reference_sample() {
    let (status, body) = send(bundled_router(), post_json("/predict", malignant_body().to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "prediction": 1,
            "result": "Malignant",
            "message": "The tumor is classified as Malignant"
        })
    );
}

#[tokio::test]
async fn test_benign_sample() {
    let (status, body) = send(bundled_router(), post_json("/predict", benign_body().to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"], 0);
    assert_eq!(body["result"], "Benign");
}

#[tokio::test]
async fn test_prediction_is_deterministic() {
    let app = bundled_router();
    let (_, first) = send(app.clone(), post_json("/predict", benign_body().to_string())).await;
    let (_, second) = send(app, post_json("/predict", benign_body().to_string())).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_missing_field_is_client_error() {
    let mut body = malignant_body();
    body.as_object_mut().unwrap().remove("area_mean");

    let (status, body) = send(bundled_router(), post_json("/predict", body.to_string())).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.get("prediction").is_none());
    let detail = body["detail"].as_array().unwrap();
    assert_eq!(detail.len(), 1);
    assert_eq!(detail[0]["loc"], json!(["body", "area_mean"]));
    assert_eq!(detail[0]["type"], "missing");
}

#[tokio::test]
async fn test_string_value_is_client_error() {
    let mut body = malignant_body();
    body["texture_mean"] = json!("ten");

    let (status, body) = send(bundled_router(), post_json("/predict", body.to_string())).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"][0]["loc"], json!(["body", "texture_mean"]));
    assert_eq!(body["detail"][0]["type"], "float_type");
}

#[tokio::test]
async fn test_spaced_column_name_is_not_a_request_key() {
    let mut body = malignant_body();
    let object = body.as_object_mut().unwrap();
    let value = object.remove("concave_points_mean").unwrap();
    object.insert("concave points_mean".to_string(), value);

    let (status, body) = send(bundled_router(), post_json("/predict", body.to_string())).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"][0]["loc"], json!(["body", "concave_points_mean"]));
}

#[tokio::test]
async fn test_malformed_json_is_client_error() {
    let (status, body) = send(bundled_router(), post_json("/predict", "{\"radius_mean\": ".to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"][0]["type"], "json_invalid");

    let (status, body) = send(bundled_router(), post_json("/predict", String::new())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"][0]["type"], "json_invalid");
}

#[tokio::test]
async fn test_extra_fields() {
    let mut body = malignant_body();
    body["patient_name"] = json!("n/a");

    let (status, _) = send(bundled_router(), post_json("/predict", body.to_string())).await;
    assert_eq!(status, StatusCode::OK);

    let mut config = Config::default();
    config.validation.reject_unknown_fields = true;
    let artifacts = Artifacts::from_parts(Arc::new(IdentityScaler), Arc::new(SlowModel(Duration::ZERO))).unwrap();
    let strict = router_with(artifacts, &config);

    let (status, response) = send(strict, post_json("/predict", body.to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response["detail"][0]["type"], "extra_forbidden");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut body = malignant_body();
    body["padding"] = json!("x".repeat(128 * 1024));

    let (status, _) = send(bundled_router(), post_json("/predict", body.to_string())).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_inference_failure_is_sanitized() {
    let (status, body) = send(fake_router(FailingModel), post_json("/predict", malignant_body().to_string())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Internal server error", "code": "INFERENCE_FAILED"}));
    assert!(!body.to_string().contains("secret"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_health_under_prediction_load() {
    let app = fake_router(SlowModel(Duration::from_secs(2)));

    let mut in_flight = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        in_flight.push(tokio::spawn(async move {
            send(app, post_json("/predict", malignant_body().to_string())).await
        }));
    }

    let (status, body) = tokio::time::timeout(Duration::from_millis(500), send(app.clone(), get("/health")))
        .await
        .expect("health check blocked behind predictions");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    for handle in in_flight {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "Malignant");
    }
}

#[tokio::test]
async fn test_cors_preflight_from_allowed_origin() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/predict")
        .header(header::ORIGIN, FRONTEND)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();

    let response = bundled_router().oneshot(request).await.unwrap();
    let headers = response.headers();

    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], FRONTEND);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "content-type");
}

#[tokio::test]
async fn test_cors_ignores_unknown_origin() {
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();

    let response = bundled_router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}
