//! Classifier loading at startup

use crate::config::{ModelFormat, ServerConfig};
use anyhow::{Context, Result};
use predictor_lib::predictor::{LogisticClassifier, OnnxClassifier, OnnxOptions};
use predictor_lib::{ClassifierAdapter, FeatureSchema};
use std::sync::Arc;

/// Load the configured model artifact. Any failure here is fatal.
pub fn load_classifier(
    config: &ServerConfig,
    schema: &FeatureSchema,
) -> Result<Arc<dyn ClassifierAdapter>> {
    let path = config.model_path.as_path();
    let sha256 = config.model_sha256.as_deref();

    let classifier: Arc<dyn ClassifierAdapter> = match config.model_format() {
        ModelFormat::Onnx => {
            let options = OnnxOptions {
                output_index: config.onnx_output_index,
                expected_sha256: config.model_sha256.clone(),
                version: config.model_version.clone(),
            };
            Arc::new(
                OnnxClassifier::load(path, schema.len(), options)
                    .context("Failed to load ONNX classifier")?,
            )
        }
        ModelFormat::Logistic => Arc::new(
            LogisticClassifier::load(path, schema, sha256, config.model_version.clone())
                .context("Failed to load logistic classifier")?,
        ),
    };

    Ok(classifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use predictor_lib::predictor::LogisticModel;
    use predictor_lib::schema::DIABETES_FEATURES;
    use std::io::Write;

    fn write_logistic_model() -> tempfile::NamedTempFile {
        let model = LogisticModel {
            version: "logreg-v1".to_string(),
            feature_names: DIABETES_FEATURES.iter().map(|f| f.to_string()).collect(),
            coefficients: vec![0.1; 21],
            intercept: -1.0,
            scaler_mean: None,
            scaler_scale: None,
        };
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(serde_json::to_string(&model).unwrap().as_bytes())
            .unwrap();
        file
    }

    #[test]
    fn test_logistic_inferred_from_extension() {
        let file = write_logistic_model();
        let config = ServerConfig {
            model_path: file.path().to_path_buf(),
            ..Default::default()
        };
        let classifier =
            load_classifier(&config, &FeatureSchema::diabetes_indicators()).unwrap();
        assert_eq!(classifier.model_version(), "logreg-v1");
    }

    #[test]
    fn test_version_override() {
        let file = write_logistic_model();
        let config = ServerConfig {
            model_path: file.path().to_path_buf(),
            model_version: Some("prod-7".to_string()),
            ..Default::default()
        };
        let classifier =
            load_classifier(&config, &FeatureSchema::diabetes_indicators()).unwrap();
        assert_eq!(classifier.model_version(), "prod-7");
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let config = ServerConfig {
            model_path: "/nonexistent/diabetes_model.onnx".into(),
            ..Default::default()
        };
        assert!(load_classifier(&config, &FeatureSchema::diabetes_indicators()).is_err());
    }
}
