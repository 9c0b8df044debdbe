//! Logistic-regression classifier loaded from a JSON artifact
//!
//! Artifact layout:
//!
//! ```json
//! {
//!   "version": "logreg-2015-v1",
//!   "feature_names": ["HighBP", "HighChol", "..."],
//!   "coefficients": [0.71, 0.55, "..."],
//!   "intercept": -3.2,
//!   "scaler_mean": [0.43, 0.42, "..."],
//!   "scaler_scale": [0.49, 0.49, "..."]
//! }
//! ```
//!
//! Features are standardized with `(x - mean) / scale` when the scaler is
//! present, then passed through the logistic function.

use super::artifact::read_artifact;
use super::ClassifierAdapter;
use crate::error::InferenceError;
use crate::models::FeatureVector;
use crate::schema::FeatureSchema;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Serialized logistic-regression parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub version: String,
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default)]
    pub scaler_mean: Option<Vec<f64>>,
    #[serde(default)]
    pub scaler_scale: Option<Vec<f64>>,
}

impl LogisticModel {
    /// Check the parameters against the serving schema
    pub fn check(&self, schema: &FeatureSchema) -> Result<()> {
        if self.feature_names.as_slice() != schema.fields() {
            anyhow::bail!(
                "Model feature order {:?} does not match schema {:?}",
                self.feature_names,
                schema.fields()
            );
        }
        let n = schema.len();
        if self.coefficients.len() != n {
            anyhow::bail!("Model has {} coefficients, expected {}", self.coefficients.len(), n);
        }
        if let Some(mean) = &self.scaler_mean {
            if mean.len() != n {
                anyhow::bail!("Scaler mean has {} values, expected {}", mean.len(), n);
            }
        }
        if let Some(scale) = &self.scaler_scale {
            if scale.len() != n {
                anyhow::bail!("Scaler scale has {} values, expected {}", scale.len(), n);
            }
            if scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                anyhow::bail!("Scaler scale values must be finite and non-zero");
            }
        }
        let all_finite = self.intercept.is_finite()
            && self.coefficients.iter().all(|c| c.is_finite())
            && self
                .scaler_mean
                .iter()
                .flatten()
                .all(|m| m.is_finite());
        if !all_finite {
            anyhow::bail!("Model parameters must be finite");
        }
        Ok(())
    }
}

/// Pure-Rust logistic classifier
#[derive(Debug, Clone)]
pub struct LogisticClassifier {
    model: LogisticModel,
}

impl LogisticClassifier {
    /// Build from parameters, checking them against the schema
    pub fn new(model: LogisticModel, schema: &FeatureSchema) -> Result<Self> {
        model.check(schema)?;
        Ok(Self { model })
    }

    /// Load a JSON artifact from disk. `version` replaces the version stored in the artifact.
    pub fn load(
        path: &Path,
        schema: &FeatureSchema,
        expected_sha256: Option<&str>,
        version: Option<String>,
    ) -> Result<Self> {
        let bytes = read_artifact(path, expected_sha256)?;
        let mut model: LogisticModel = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse logistic model {:?}", path))?;
        if let Some(version) = version {
            model.version = version;
        }
        let classifier = Self::new(model, schema)
            .with_context(|| format!("Invalid logistic model {:?}", path))?;

        info!(
            path = ?path,
            version = %classifier.model.version,
            "Logistic classifier loaded"
        );
        Ok(classifier)
    }

    fn logit(&self, values: &[f64]) -> f64 {
        let m = &self.model;
        values
            .iter()
            .enumerate()
            .map(|(i, x)| {
                let mean = m.scaler_mean.as_ref().map_or(0.0, |v| v[i]);
                let scale = m.scaler_scale.as_ref().map_or(1.0, |v| v[i]);
                m.coefficients[i] * (x - mean) / scale
            })
            .sum::<f64>()
            + m.intercept
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl ClassifierAdapter for LogisticClassifier {
    fn predict_probability(&self, features: &FeatureVector) -> Result<f64, InferenceError> {
        if features.len() != self.model.coefficients.len() {
            return Err(InferenceError::Execution(format!(
                "Model expects {} features, got {}",
                self.model.coefficients.len(),
                features.len()
            )));
        }
        let p = sigmoid(self.logit(features.values()));
        if p.is_finite() {
            Ok(p)
        } else {
            Err(InferenceError::InvalidOutput(format!("probability {} is not finite", p)))
        }
    }

    fn model_version(&self) -> String {
        self.model.version.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DIABETES_FEATURES;
    use crate::validator::Validator;
    use serde_json::{json, Map, Value};
    use std::io::Write;

    fn zero_model() -> LogisticModel {
        LogisticModel {
            version: "test-v1".to_string(),
            feature_names: DIABETES_FEATURES.iter().map(|f| f.to_string()).collect(),
            coefficients: vec![0.0; 21],
            intercept: 0.0,
            scaler_mean: None,
            scaler_scale: None,
        }
    }

    fn vector(bmi: f64) -> FeatureVector {
        let record: Map<String, Value> = DIABETES_FEATURES
            .iter()
            .map(|name| {
                let v = if *name == "BMI" { bmi } else { 0.0 };
                (name.to_string(), json!(v))
            })
            .collect();
        Validator::new(FeatureSchema::diabetes_indicators())
            .validate(&record)
            .unwrap()
    }

    #[test]
    fn test_zero_weights_give_half() {
        let schema = FeatureSchema::diabetes_indicators();
        let clf = LogisticClassifier::new(zero_model(), &schema).unwrap();
        let p = clf.predict_probability(&vector(26.0)).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_scaler_and_coefficients_applied() {
        let schema = FeatureSchema::diabetes_indicators();
        let mut model = zero_model();
        model.coefficients[3] = 1.0;
        model.scaler_mean = Some(vec![0.0; 21]);
        let mut scale = vec![1.0; 21];
        scale[3] = 2.0;
        model.scaler_scale = Some(scale);
        let bmi_index = schema.position("BMI").unwrap();
        model.scaler_mean.as_mut().unwrap()[bmi_index] = 26.0;

        let clf = LogisticClassifier::new(model, &schema).unwrap();
        // (30 - 26) / 2 = 2
        let p = clf.predict_probability(&vector(30.0)).unwrap();
        assert!((p - sigmoid(2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_deterministic() {
        let schema = FeatureSchema::diabetes_indicators();
        let mut model = zero_model();
        model.coefficients = (0..21).map(|i| i as f64 * 0.01).collect();
        let clf = LogisticClassifier::new(model, &schema).unwrap();
        let v = vector(31.5);
        assert_eq!(
            clf.predict_probability(&v).unwrap(),
            clf.predict_probability(&v).unwrap()
        );
    }

    #[test]
    fn test_feature_order_mismatch_rejected() {
        let schema = FeatureSchema::diabetes_indicators();
        let mut model = zero_model();
        model.feature_names.swap(0, 1);
        let err = LogisticClassifier::new(model, &schema).unwrap_err();
        assert!(err.to_string().contains("does not match schema"));
    }

    #[test]
    fn test_zero_scale_rejected() {
        let schema = FeatureSchema::diabetes_indicators();
        let mut model = zero_model();
        model.scaler_scale = Some(vec![0.0; 21]);
        assert!(LogisticClassifier::new(model, &schema).is_err());
    }

    #[test]
    fn test_load_from_json_file() {
        let schema = FeatureSchema::diabetes_indicators();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&zero_model()).unwrap().as_bytes())
            .unwrap();

        let clf = LogisticClassifier::load(file.path(), &schema, None, None).unwrap();
        assert_eq!(clf.model_version(), "test-v1");
    }

    #[test]
    fn test_load_with_version_override() {
        let schema = FeatureSchema::diabetes_indicators();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&zero_model()).unwrap().as_bytes())
            .unwrap();

        let clf =
            LogisticClassifier::load(file.path(), &schema, None, Some("prod-7".to_string())).unwrap();
        assert_eq!(clf.model_version(), "prod-7");
        assert_eq!(clf.predict_probability(&vector(26.0)).unwrap(), 0.5);
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let schema = FeatureSchema::diabetes_indicators();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"version\": 1}").unwrap();
        assert!(LogisticClassifier::load(file.path(), &schema, None, None).is_err());
    }
}
