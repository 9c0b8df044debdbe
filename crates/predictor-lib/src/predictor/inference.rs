//! ONNX inference using tract
//!
//! Loads a binary classifier exported to ONNX (for example from scikit-learn
//! or CatBoost with the probability output kept as a plain tensor) and
//! evaluates it in-process.

use super::artifact::read_artifact;
use super::ClassifierAdapter;
use crate::error::InferenceError;
use crate::models::FeatureVector;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, info, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 50;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Loading options for an ONNX classifier
#[derive(Debug, Clone, Default)]
pub struct OnnxOptions {
    /// Which model output holds probabilities; the last output when unset
    pub output_index: Option<usize>,
    /// Expected SHA256 of the model file
    pub expected_sha256: Option<String>,
    /// Version label; the file stem when unset
    pub version: Option<String>,
}

/// ONNX-based classifier using tract for lightweight inference
pub struct OnnxClassifier {
    model: TractModel,
    num_features: usize,
    output_index: Option<usize>,
    version: String,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("num_features", &self.num_features)
            .field("output_index", &self.output_index)
            .field("version", &self.version)
            .finish()
    }
}

impl OnnxClassifier {
    /// Load a classifier from an ONNX file expecting `num_features` inputs
    pub fn load(path: &Path, num_features: usize, options: OnnxOptions) -> Result<Self> {
        let bytes = read_artifact(path, options.expected_sha256.as_deref())?;
        let version = options.version.unwrap_or_else(|| version_from_path(path));
        let classifier = Self::from_bytes(&bytes, num_features, options.output_index, version)
            .with_context(|| format!("Failed to load ONNX model {:?}", path))?;

        info!(
            path = ?path,
            version = %classifier.version,
            num_features = num_features,
            "ONNX classifier loaded"
        );
        Ok(classifier)
    }

    /// Create a classifier from model bytes
    pub fn from_bytes(
        model_bytes: &[u8],
        num_features: usize,
        output_index: Option<usize>,
        version: impl Into<String>,
    ) -> Result<Self> {
        let model = Self::load_model(model_bytes, num_features)?;
        Ok(Self {
            model,
            num_features,
            output_index,
            version: version.into(),
        })
    }

    /// Parse and optimize an ONNX model from bytes
    fn load_model(model_bytes: &[u8], num_features: usize) -> Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, num_features]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    /// Convert feature vector to tensor input
    fn features_to_tensor(&self, features: &FeatureVector) -> Result<Tensor, InferenceError> {
        if features.len() != self.num_features {
            return Err(InferenceError::Execution(format!(
                "Model expects {} features, got {}",
                self.num_features,
                features.len()
            )));
        }
        let array = tract_ndarray::Array2::from_shape_vec((1, self.num_features), features.to_f32())
            .map_err(|e| InferenceError::Execution(format!("Failed to build input tensor: {}", e)))?;
        Ok(array.into())
    }

    /// Pick the positive-class probability out of the selected output
    fn output_to_probability(&self, outputs: &TVec<TValue>) -> Result<f64, InferenceError> {
        if outputs.is_empty() {
            return Err(InferenceError::InvalidOutput("Model produced no outputs".to_string()));
        }
        let idx = self.output_index.unwrap_or(outputs.len() - 1);
        let output = outputs.get(idx).ok_or_else(|| {
            InferenceError::InvalidOutput(format!(
                "Model has {} outputs, output {} requested",
                outputs.len(),
                idx
            ))
        })?;

        let as_f32 = output
            .cast_to::<f32>()
            .map_err(|e| InferenceError::InvalidOutput(format!("Output is not numeric: {}", e)))?;
        let view = as_f32
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::InvalidOutput(e.to_string()))?;
        let values: Vec<f32> = view.iter().copied().collect();

        probability_from_values(&values)
    }
}

/// One value is the probability itself; two values are [P(0), P(1)]
fn probability_from_values(values: &[f32]) -> Result<f64, InferenceError> {
    match values {
        [p] => Ok(*p as f64),
        [_, p] => Ok(*p as f64),
        other => Err(InferenceError::InvalidOutput(format!(
            "Expected 1 or 2 output values, got {}",
            other.len()
        ))),
    }
}

fn version_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

impl ClassifierAdapter for OnnxClassifier {
    fn predict_probability(&self, features: &FeatureVector) -> Result<f64, InferenceError> {
        let start = Instant::now();
        let input = self.features_to_tensor(features)?;

        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Execution(e.to_string()))?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        self.output_to_probability(&outputs)
    }

    fn model_version(&self) -> String {
        self.version.clone()
    }
}
