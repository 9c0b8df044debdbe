//! Integration tests for the prediction server API

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use diabetes_predictor::api::{create_router, serve_listener, AppState};
use predictor_lib::{
    health::{components, HealthRegistry},
    observability::{ServingMetrics, StructuredLogger},
    ClassifierAdapter, FeatureSchema, FeatureVector, InferenceError, PredictionService,
    ResponseFormatter, ServiceConfig,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Classifier double returning a fixed probability and counting calls
struct CountingClassifier {
    probability: f64,
    calls: AtomicUsize,
}

impl CountingClassifier {
    fn new(probability: f64) -> Self {
        Self {
            probability,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ClassifierAdapter for CountingClassifier {
    fn predict_probability(&self, _features: &FeatureVector) -> Result<f64, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.probability)
    }

    fn model_version(&self) -> String {
        "stub-v1".to_string()
    }
}

struct UnavailableClassifier;

impl ClassifierAdapter for UnavailableClassifier {
    fn predict_probability(&self, _features: &FeatureVector) -> Result<f64, InferenceError> {
        Err(InferenceError::Unavailable("model not loaded".to_string()))
    }

    fn model_version(&self) -> String {
        "none".to_string()
    }
}

struct BrokenClassifier;

impl ClassifierAdapter for BrokenClassifier {
    fn predict_probability(&self, _features: &FeatureVector) -> Result<f64, InferenceError> {
        Err(InferenceError::Execution("tensor shape mismatch".to_string()))
    }

    fn model_version(&self) -> String {
        "broken".to_string()
    }
}

struct SlowClassifier;

impl ClassifierAdapter for SlowClassifier {
    fn predict_probability(&self, _features: &FeatureVector) -> Result<f64, InferenceError> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(0.5)
    }

    fn model_version(&self) -> String {
        "slow".to_string()
    }
}

fn sample_request() -> Value {
    json!({
        "HighBP": 1.0,
        "HighChol": 0.0,
        "CholCheck": 1.0,
        "BMI": 26.0,
        "Smoker": 0.0,
        "Stroke": 0.0,
        "HeartDiseaseorAttack": 0.0,
        "PhysActivity": 1.0,
        "Fruits": 0.0,
        "Veggies": 1.0,
        "HvyAlcoholConsump": 0.0,
        "AnyHealthcare": 1.0,
        "NoDocbcCost": 0.0,
        "GenHlth": 3.0,
        "MentHlth": 5.0,
        "PhysHlth": 30.0,
        "DiffWalk": 0.0,
        "Sex": 1.0,
        "Age": 4.0,
        "Education": 6.0,
        "Income": 8.0
    })
}

async fn build_state(classifier: Arc<dyn ClassifierAdapter>) -> AppState {
    let health_registry = HealthRegistry::new();

    let service = PredictionService::new(
        FeatureSchema::diabetes_indicators(),
        classifier,
        ServiceConfig::default(),
    )
    .unwrap();

    AppState::new(
        Arc::new(service),
        health_registry,
        ServingMetrics::new(),
        StructuredLogger::new("test-instance"),
    )
}

async fn setup_test_app(classifier: Arc<dyn ClassifierAdapter>) -> (Router, Arc<AppState>) {
    let state = Arc::new(build_state(classifier).await);
    (create_router(state.clone()), state)
}

fn post_predict(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_predict_returns_probability() {
    let classifier = Arc::new(CountingClassifier::new(0.25));
    let (app, _state) = setup_test_app(classifier.clone()).await;

    let response = app
        .oneshot(post_predict(sample_request().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"diabetes_binary": 0.25}));
    assert_eq!(classifier.calls(), 1);
}

#[tokio::test]
async fn test_predict_missing_income_is_validation_error() {
    let classifier = Arc::new(CountingClassifier::new(0.25));
    let (app, _state) = setup_test_app(classifier.clone()).await;

    let mut request = sample_request();
    request.as_object_mut().unwrap().remove("Income");

    let response = app
        .oneshot(post_predict(request.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "validation");
    assert_eq!(body["error"]["missing_fields"], json!(["Income"]));
    assert_eq!(classifier.calls(), 0);
}

#[tokio::test]
async fn test_predict_reports_all_problems_at_once() {
    let classifier = Arc::new(CountingClassifier::new(0.25));
    let (app, _state) = setup_test_app(classifier.clone()).await;

    let mut request = sample_request();
    let record = request.as_object_mut().unwrap();
    record.remove("Age");
    record.insert("BMI".to_string(), json!("heavy"));
    record.insert("Glucose".to_string(), json!(140));

    let response = app
        .oneshot(post_predict(request.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["missing_fields"], json!(["Age"]));
    assert_eq!(body["error"]["unexpected_fields"], json!(["Glucose"]));
    assert!(body["error"]["type_errors"]["BMI"].is_string());
    assert_eq!(classifier.calls(), 0);
}

#[tokio::test]
async fn test_predict_malformed_json_is_validation_error() {
    let classifier = Arc::new(CountingClassifier::new(0.25));
    let (app, _state) = setup_test_app(classifier.clone()).await;

    let response = app.oneshot(post_predict("{not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "validation");
    assert!(body["error"]["payload"].is_string());
    assert_eq!(classifier.calls(), 0);
}

#[tokio::test]
async fn test_predict_non_object_is_validation_error() {
    let (app, _state) = setup_test_app(Arc::new(CountingClassifier::new(0.25))).await;

    let response = app.oneshot(post_predict("[1, 2, 3]")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["missing_fields"].as_array().unwrap().len(), 21);
}

#[tokio::test]
async fn test_unavailable_model_is_503_inference_error() {
    let (app, _state) = setup_test_app(Arc::new(UnavailableClassifier)).await;

    let response = app
        .oneshot(post_predict(sample_request().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "inference");
    assert_eq!(body["error"]["code"], "MODEL_UNAVAILABLE");
}

#[tokio::test]
async fn test_inference_failure_is_500_and_degrades_health() {
    let (app, state) = setup_test_app(Arc::new(BrokenClassifier)).await;

    let response = app
        .clone()
        .oneshot(post_predict(sample_request().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INFERENCE_FAILED");

    let health = state.health_registry.health().await;
    assert_eq!(
        health.components[components::CLASSIFIER].status,
        predictor_lib::ComponentStatus::Degraded
    );

    // Degraded still returns 200 (operational)
    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "degraded");
}

#[tokio::test]
async fn test_slow_model_times_out() {
    let state = build_state(Arc::new(SlowClassifier))
        .await
        .with_inference_timeout(Duration::from_millis(50));
    let app = create_router(Arc::new(state));

    let response = app
        .oneshot(post_predict(sample_request().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"]["code"], "INFERENCE_TIMEOUT");
}

#[tokio::test]
async fn test_label_included_when_configured() {
    let state = build_state(Arc::new(CountingClassifier::new(0.75)))
        .await
        .with_formatter(ResponseFormatter::with_label(true));

    let response = create_router(Arc::new(state))
        .oneshot(post_predict(sample_request().to_string()))
        .await
        .unwrap();

    assert_eq!(
        body_json(response).await,
        json!({"diabetes_binary": 0.75, "diabetes_label": 1})
    );
}

#[tokio::test]
async fn test_repeated_requests_are_identical() {
    let (app, _state) = setup_test_app(Arc::new(CountingClassifier::new(0.42))).await;

    let first = app
        .clone()
        .oneshot(post_predict(sample_request().to_string()))
        .await
        .unwrap();
    let second = app
        .oneshot(post_predict(sample_request().to_string()))
        .await
        .unwrap();

    assert_eq!(body_json(first).await, body_json(second).await);
}

#[tokio::test]
async fn test_schema_lists_fields_in_order() {
    let (app, _state) = setup_test_app(Arc::new(CountingClassifier::new(0.25))).await;

    let response = app.oneshot(get("/schema")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let fields = body["fields"].as_array().unwrap();
    assert_eq!(fields.len(), 21);
    assert_eq!(fields[0], "HighBP");
    assert_eq!(fields[20], "Income");
    assert_eq!(body["threshold"], 0.5);
    assert_eq!(body["model_version"], "stub-v1");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state) = setup_test_app(Arc::new(CountingClassifier::new(0.25))).await;

    let response = app.oneshot(get("/readyz")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state) = setup_test_app(Arc::new(CountingClassifier::new(0.25))).await;
    state.health_registry.mark_model_loaded("stub-v1").await;

    let response = app.oneshot(get("/readyz")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ready"], true);
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app(Arc::new(CountingClassifier::new(0.25))).await;
    state
        .health_registry
        .set_unhealthy(components::CLASSIFIER, "Model file missing")
        .await;

    let response = app.oneshot(get("/healthz")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let health = body_json(response).await;
    assert_eq!(health["status"], "unhealthy");
    assert!(health["components"]["classifier"].is_object());
    assert!(health["components"]["api"].is_object());
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app(Arc::new(CountingClassifier::new(0.25))).await;
    state.metrics.set_model_version("stub-v1", "onnx");

    let response = app
        .clone()
        .oneshot(post_predict(sample_request().to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("diabetes_predictor_inference_latency_seconds_bucket"));
    assert!(metrics_text.contains("diabetes_predictor_requests_total"));
    assert!(metrics_text.contains("diabetes_predictor_predicted_labels_total"));
    assert!(metrics_text.contains("diabetes_predictor_model_version_info"));
}

#[tokio::test]
async fn test_served_over_tcp() {
    let state = Arc::new(build_state(Arc::new(CountingClassifier::new(0.25))).await);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(serve_listener(listener, state, async move {
        let _ = rx.await;
    }));

    let response = reqwest::Client::new()
        .post(format!("http://{}/predict", addr))
        .json(&sample_request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert!(body["diabetes_binary"].is_number());

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
