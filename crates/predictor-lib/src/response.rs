//! Response formatting
//!
//! Maps a service outcome to the externally visible response body. Transport
//! status codes are left to the caller via [`ResponseStatus`].

use crate::error::{InferenceError, PredictionError};
use crate::models::PredictionResult;
use crate::validator::ValidationFailure;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Outcome class of a formatted response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    ValidationError,
    InferenceError,
}

/// Successful prediction body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessBody {
    /// Estimated probability of diabetes
    pub diabetes_binary: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diabetes_label: Option<u8>,
}

/// Error detail shared by both failure kinds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unexpected_fields: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_errors: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Success(SuccessBody),
    Error(ErrorBody),
}

/// A response ready for any transport
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedResponse {
    pub status: ResponseStatus,
    pub body: ResponseBody,
}

/// Renders prediction outcomes into response bodies
#[derive(Debug, Clone, Default)]
pub struct ResponseFormatter {
    include_label: bool,
}

impl ResponseFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also emit the thresholded label as `diabetes_label`
    pub fn with_label(include_label: bool) -> Self {
        Self { include_label }
    }

    pub fn format(&self, outcome: &Result<PredictionResult, PredictionError>) -> FormattedResponse {
        match outcome {
            Ok(result) => self.success(result),
            Err(err) => self.error(err),
        }
    }

    pub fn success(&self, result: &PredictionResult) -> FormattedResponse {
        FormattedResponse {
            status: ResponseStatus::Success,
            body: ResponseBody::Success(SuccessBody {
                diabetes_binary: result.probability,
                diabetes_label: self.include_label.then_some(result.label),
            }),
        }
    }

    pub fn error(&self, err: &PredictionError) -> FormattedResponse {
        match err {
            PredictionError::Validation(failure) => self.validation_error(failure),
            PredictionError::Inference(err) => self.inference_error(err),
        }
    }

    pub fn validation_error(&self, failure: &ValidationFailure) -> FormattedResponse {
        FormattedResponse {
            status: ResponseStatus::ValidationError,
            body: ResponseBody::Error(ErrorBody {
                error: ErrorDetail {
                    kind: "validation",
                    code: "VALIDATION_ERROR",
                    message: failure.to_string(),
                    missing_fields: Some(failure.missing_fields.clone()),
                    unexpected_fields: Some(failure.unexpected_fields.clone()),
                    type_errors: Some(failure.type_errors.clone()),
                    payload: failure.payload.clone(),
                },
            }),
        }
    }

    pub fn inference_error(&self, err: &InferenceError) -> FormattedResponse {
        let code = match err {
            InferenceError::Unavailable(_) => "MODEL_UNAVAILABLE",
            InferenceError::Execution(_) => "INFERENCE_FAILED",
            InferenceError::InvalidOutput(_) => "INVALID_MODEL_OUTPUT",
            InferenceError::Timeout(_) => "INFERENCE_TIMEOUT",
        };
        FormattedResponse {
            status: ResponseStatus::InferenceError,
            body: ResponseBody::Error(ErrorBody {
                error: ErrorDetail {
                    kind: "inference",
                    code,
                    message: err.to_string(),
                    missing_fields: None,
                    unexpected_fields: None,
                    type_errors: None,
                    payload: None,
                },
            }),
        }
    }
}
