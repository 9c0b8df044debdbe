//! Observability infrastructure for the prediction server
//!
//! Provides:
//! - Prometheus metrics (request outcomes, predicted labels, inference latency, model version)
//! - Structured JSON logging with tracing

use crate::error::InferenceError;
use crate::models::PredictionResult;
use crate::response::ResponseStatus;
use crate::validator::ValidationFailure;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter_vec, GaugeVec, Histogram,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServingMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ServingMetricsInner {
    inference_latency_seconds: Histogram,
    requests_total: IntCounterVec,
    predicted_labels_total: IntCounterVec,
    model_version_info: GaugeVec,
}

impl ServingMetricsInner {
    fn new() -> Self {
        Self {
            inference_latency_seconds: register_histogram!(
                "diabetes_predictor_inference_latency_seconds",
                "Time spent validating and running the classifier for one request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            requests_total: register_int_counter_vec!(
                "diabetes_predictor_requests_total",
                "Prediction requests by outcome",
                &["outcome"]
            )
            .expect("Failed to register requests_total"),

            predicted_labels_total: register_int_counter_vec!(
                "diabetes_predictor_predicted_labels_total",
                "Successful predictions by thresholded label",
                &["label"]
            )
            .expect("Failed to register predicted_labels_total"),

            model_version_info: register_gauge_vec!(
                "diabetes_predictor_model_version_info",
                "Information about the currently loaded model",
                &["version", "format"]
            )
            .expect("Failed to register model_version_info"),
        }
    }
}

/// Serving metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServingMetrics {
    _private: (),
}

impl Default for ServingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServingMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServingMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServingMetricsInner {
        GLOBAL_METRICS.get_or_init(ServingMetricsInner::new)
    }

    /// Record an inference latency observation
    pub fn observe_inference_latency(&self, duration_secs: f64) {
        self.inner().inference_latency_seconds.observe(duration_secs);
    }

    /// Count a finished request by outcome
    pub fn record_outcome(&self, status: ResponseStatus) {
        let outcome = match status {
            ResponseStatus::Success => "success",
            ResponseStatus::ValidationError => "validation_error",
            ResponseStatus::InferenceError => "inference_error",
        };
        self.inner().requests_total.with_label_values(&[outcome]).inc();
    }

    /// Count a successful prediction by label
    pub fn record_label(&self, label: u8) {
        self.inner()
            .predicted_labels_total
            .with_label_values(&[&label.to_string()])
            .inc();
    }

    /// Update model version info
    pub fn set_model_version(&self, version: &str, format: &str) {
        self.inner().model_version_info.reset();
        self.inner()
            .model_version_info
            .with_label_values(&[version, format])
            .set(1.0);
    }
}

/// Structured logger for serving events
///
/// Provides consistent JSON-formatted logging for predictions, rejected
/// requests and lifecycle events. Feature values are never logged.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a successful prediction
    pub fn log_prediction(&self, result: &PredictionResult, threshold: f64, elapsed_ms: f64) {
        info!(
            event = "prediction_generated",
            instance = %self.instance,
            probability = result.probability,
            label = result.label,
            threshold = threshold,
            model_version = %result.model_version,
            elapsed_ms = elapsed_ms,
            "Generated diabetes prediction"
        );
    }

    /// Log a rejected request
    pub fn log_validation_failure(&self, failure: &ValidationFailure) {
        info!(
            event = "validation_failed",
            instance = %self.instance,
            missing_fields = ?failure.missing_fields,
            unexpected_fields = ?failure.unexpected_fields,
            type_errors = ?failure.type_errors.keys().collect::<Vec<_>>(),
            payload = ?failure.payload,
            "Rejected prediction request"
        );
    }

    /// Log a model evaluation failure
    pub fn log_inference_failure(&self, err: &InferenceError, model_version: &str) {
        warn!(
            event = "inference_failed",
            instance = %self.instance,
            model_version = %model_version,
            error = %err,
            "Classifier could not be evaluated"
        );
    }

    /// Log model load at startup
    pub fn log_model_loaded(&self, path: &str, format: &str, version: &str) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            path = %path,
            format = %format,
            model_version = %version,
            "Classifier model loaded"
        );
    }

    /// Log server startup
    pub fn log_startup(&self, version: &str, model_version: &str, threshold: f64) {
        info!(
            event = "server_started",
            instance = %self.instance,
            server_version = %version,
            model_version = %model_version,
            threshold = threshold,
            "Prediction server started"
        );
    }

    /// Log server shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Prediction server shutting down"
        );
    }
}
