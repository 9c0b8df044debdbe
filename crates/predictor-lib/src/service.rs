//! Prediction service
//!
//! Runs one request/response cycle: validate, infer, threshold. The service
//! holds no mutable state; a single instance is shared by all requests.

use crate::error::{ConfigError, InferenceError, PredictionError};
use crate::models::{FeatureVector, PredictionResult};
use crate::predictor::ClassifierAdapter;
use crate::schema::FeatureSchema;
use crate::validator::{ValidationFailure, Validator};
use serde_json::{Map, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// Default decision threshold for the positive label
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Configuration for the prediction service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Probability at or above which the label is 1
    pub threshold: f64,
    /// Reject numeric strings instead of coercing them
    pub strict_numbers: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            strict_numbers: false,
        }
    }
}

/// Orchestrates validation, inference and thresholding
pub struct PredictionService {
    validator: Validator,
    classifier: Arc<dyn ClassifierAdapter>,
    threshold: f64,
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("validator", &self.validator)
            .field("model_version", &self.classifier.model_version())
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl PredictionService {
    pub fn new(
        schema: FeatureSchema,
        classifier: Arc<dyn ClassifierAdapter>,
        config: ServiceConfig,
    ) -> Result<Self, ConfigError> {
        if !config.threshold.is_finite() || !(0.0..=1.0).contains(&config.threshold) {
            return Err(ConfigError::InvalidThreshold(config.threshold));
        }

        let validator = if config.strict_numbers {
            Validator::strict(schema)
        } else {
            Validator::new(schema)
        };

        Ok(Self {
            validator,
            classifier,
            threshold: config.threshold,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.validator.schema()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn model_version(&self) -> String {
        self.classifier.model_version()
    }

    /// Validation step alone, for callers that run inference elsewhere
    pub fn validate_value(&self, payload: &Value) -> Result<FeatureVector, ValidationFailure> {
        self.validator.validate_value(payload)
    }

    /// Validate a raw JSON payload and run inference on it
    pub fn predict_value(&self, payload: &Value) -> Result<PredictionResult, PredictionError> {
        let features = self.validator.validate_value(payload)?;
        Ok(self.predict_vector(&features)?)
    }

    /// Validate a request object and run inference on it
    ///
    /// The classifier is never called when validation fails.
    pub fn predict(&self, request: &Map<String, Value>) -> Result<PredictionResult, PredictionError> {
        let features = self.validator.validate(request)?;
        Ok(self.predict_vector(&features)?)
    }

    /// Run inference on an already validated vector
    pub fn predict_vector(&self, features: &FeatureVector) -> Result<PredictionResult, InferenceError> {
        let probability = self.invoke_classifier(features)?;

        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(InferenceError::InvalidOutput(format!(
                "probability {} outside [0, 1]",
                probability
            )));
        }

        let label = self.label_for(probability);
        debug!(probability = probability, label = label, "Prediction computed");

        Ok(PredictionResult {
            probability,
            label,
            model_version: self.classifier.model_version(),
        })
    }

    /// Label 1 iff `probability >= threshold`
    pub fn label_for(&self, probability: f64) -> u8 {
        u8::from(probability >= self.threshold)
    }

    fn invoke_classifier(&self, features: &FeatureVector) -> Result<f64, InferenceError> {
        match catch_unwind(AssertUnwindSafe(|| self.classifier.predict_probability(features))) {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(reason = %reason, "Classifier panicked during inference");
                Err(InferenceError::Execution(format!("classifier panicked: {}", reason)))
            }
        }
    }
}
