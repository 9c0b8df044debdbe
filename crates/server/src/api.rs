//! HTTP API for predictions, health checks and Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use predictor_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::{ServingMetrics, StructuredLogger},
    InferenceError, PredictionError, PredictionResult, PredictionService, ResponseFormatter,
    ValidationFailure,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Default upper bound on one inference call
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub formatter: ResponseFormatter,
    pub health_registry: HealthRegistry,
    pub metrics: ServingMetrics,
    pub logger: StructuredLogger,
    pub inference_timeout: Duration,
}

impl AppState {
    pub fn new(
        service: Arc<PredictionService>,
        health_registry: HealthRegistry,
        metrics: ServingMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            service,
            formatter: ResponseFormatter::new(),
            health_registry,
            metrics,
            logger,
            inference_timeout: DEFAULT_INFERENCE_TIMEOUT,
        }
    }

    pub fn with_formatter(mut self, formatter: ResponseFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout = timeout;
        self
    }
}

/// Status code for a prediction outcome
fn prediction_status(outcome: &Result<PredictionResult, PredictionError>) -> StatusCode {
    match outcome {
        Ok(_) => StatusCode::OK,
        Err(PredictionError::Validation(_)) => StatusCode::BAD_REQUEST,
        Err(PredictionError::Inference(e)) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
        Err(PredictionError::Inference(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Validate on the async side, then evaluate the model on the blocking pool
async fn run_prediction(
    state: &AppState,
    payload: Value,
) -> Result<PredictionResult, PredictionError> {
    let features = state.service.validate_value(&payload)?;

    let service = state.service.clone();
    let task = tokio::task::spawn_blocking(move || service.predict_vector(&features));

    match tokio::time::timeout(state.inference_timeout, task).await {
        Ok(Ok(outcome)) => Ok(outcome?),
        Ok(Err(join_err)) => Err(InferenceError::Execution(format!(
            "inference task failed: {}",
            join_err
        ))
        .into()),
        Err(_) => Err(InferenceError::Timeout(state.inference_timeout.as_millis() as u64).into()),
    }
}

/// Prediction endpoint
async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let start = Instant::now();

    let outcome = match payload {
        Ok(Json(value)) => run_prediction(&state, value).await,
        Err(rejection) => Err(ValidationFailure::malformed_payload(
            state.service.schema(),
            rejection.body_text(),
        )
        .into()),
    };

    let elapsed = start.elapsed();
    match &outcome {
        Ok(result) => {
            state.metrics.observe_inference_latency(elapsed.as_secs_f64());
            state.metrics.record_label(result.label);
            state.health_registry.record_inference(Ok(())).await;
            state
                .logger
                .log_prediction(result, state.service.threshold(), elapsed.as_secs_f64() * 1000.0);
        }
        Err(PredictionError::Validation(failure)) => {
            state.logger.log_validation_failure(failure);
        }
        Err(PredictionError::Inference(err)) => {
            state.health_registry.record_inference(Err(err)).await;
            state
                .logger
                .log_inference_failure(err, &state.service.model_version());
        }
    }

    let status = prediction_status(&outcome);
    let formatted = state.formatter.format(&outcome);
    state.metrics.record_outcome(formatted.status);

    (status, Json(formatted.body)).into_response()
}

/// Schema description
#[derive(Debug, Serialize)]
struct SchemaResponse {
    fields: Vec<String>,
    threshold: f64,
    model_version: String,
}

async fn schema(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(SchemaResponse {
        fields: state.service.schema().fields().to_vec(),
        threshold: state.service.threshold(),
        model_version: state.service.model_version(),
    })
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/schema", get(schema))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_listener<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Start the API server
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %addr, "Starting API server");
    let listener = TcpListener::bind(addr).await?;
    serve_listener(listener, state, shutdown).await
}
