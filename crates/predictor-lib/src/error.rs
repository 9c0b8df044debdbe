//! Error types for the prediction boundary

use crate::validator::ValidationFailure;
use thiserror::Error;

/// Schema construction errors. These are fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Schema has no fields at all
    #[error("Schema must declare at least one field")]
    Empty,

    /// Field name is empty or whitespace
    #[error("Field at position {0} has an empty name")]
    EmptyFieldName(usize),

    /// Field name declared more than once
    #[error("Field {0:?} is declared more than once")]
    DuplicateField(String),
}

/// The classifier could not produce a probability
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// No model is loaded or the model backend is unreachable
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    /// Model evaluation failed
    #[error("Inference failed: {0}")]
    Execution(String),

    /// Model produced something that is not a probability
    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    /// Inference did not finish within the allotted time
    #[error("Inference timed out after {0}ms")]
    Timeout(u64),
}

impl InferenceError {
    /// Whether the failure means the model could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, InferenceError::Unavailable(_) | InferenceError::Timeout(_))
    }
}

/// Outcome of a failed request: either the input or the model is at fault
#[derive(Error, Debug, Clone)]
pub enum PredictionError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl PredictionError {
    pub fn is_validation(&self) -> bool {
        matches!(self, PredictionError::Validation(_))
    }

    pub fn is_inference(&self) -> bool {
        matches!(self, PredictionError::Inference(_))
    }
}

/// Service configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Decision threshold {0} must be a finite value in [0, 1]")]
    InvalidThreshold(f64),
}
