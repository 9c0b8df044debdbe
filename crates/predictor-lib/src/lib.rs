//! Library for serving a diabetes health-indicator classifier
//!
//! This crate provides the core functionality for:
//! - The fixed 21-field feature schema and request validation
//! - Classifier adapters (ONNX via tract, JSON logistic regression)
//! - Prediction orchestration and response formatting
//! - Health checks and observability

pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod response;
pub mod schema;
pub mod service;
pub mod validator;

pub use error::{ConfigError, InferenceError, PredictionError, SchemaError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServingMetrics, StructuredLogger};
pub use predictor::ClassifierAdapter;
pub use response::{FormattedResponse, ResponseFormatter, ResponseStatus};
pub use schema::FeatureSchema;
pub use service::{PredictionService, ServiceConfig};
pub use validator::{ValidationFailure, Validator};
