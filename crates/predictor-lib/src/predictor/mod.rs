//! Binary classifier adapters
//!
//! The serving core only needs `predict_probability`; everything about how a
//! model is stored or evaluated stays behind [`ClassifierAdapter`].

mod artifact;
mod inference;
mod logistic;

pub use artifact::{compute_checksum, read_artifact};
pub use inference::{OnnxClassifier, OnnxOptions};
pub use logistic::{LogisticClassifier, LogisticModel};

use crate::error::InferenceError;
use crate::models::FeatureVector;

/// Trait for binary classifier implementations
///
/// Implementations must be read-only during inference: the same loaded model
/// is shared by every concurrent request.
pub trait ClassifierAdapter: Send + Sync {
    /// Probability of the positive class for one feature vector
    fn predict_probability(&self, features: &FeatureVector) -> Result<f64, InferenceError>;

    /// Version string of the loaded model
    fn model_version(&self) -> String;
}
