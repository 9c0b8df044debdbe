//! Server configuration

use anyhow::{Context, Result};
use predictor_lib::ServiceConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serialized model format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// ONNX graph evaluated with tract
    Onnx,
    /// JSON logistic-regression parameters
    Logistic,
}

impl ModelFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::Onnx => "onnx",
            ModelFormat::Logistic => "logistic",
        }
    }

    /// Guess the format from the file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ModelFormat::Logistic,
            _ => ModelFormat::Onnx,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Instance name reported in structured logs
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for the prediction, health and metrics API
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the trained model artifact
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Model format; inferred from the file extension when unset
    #[serde(default)]
    pub model_format: Option<ModelFormat>,

    /// Expected SHA256 of the model artifact
    #[serde(default)]
    pub model_sha256: Option<String>,

    /// Version label overriding the one derived from the artifact
    #[serde(default)]
    pub model_version: Option<String>,

    /// ONNX output holding probabilities; the last output when unset
    #[serde(default)]
    pub onnx_output_index: Option<usize>,

    /// Decision threshold for the positive label
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Reject numeric strings in requests
    #[serde(default)]
    pub strict_numbers: bool,

    /// Add `diabetes_label` to success responses
    #[serde(default)]
    pub include_label: bool,

    /// Upper bound on a single inference call in milliseconds
    #[serde(default = "default_inference_timeout_ms")]
    pub inference_timeout_ms: u64,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "diabetes-predictor".to_string())
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9696
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/diabetes_model.onnx")
}

fn default_threshold() -> f64 {
    predictor_lib::service::DEFAULT_THRESHOLD
}

fn default_inference_timeout_ms() -> u64 {
    2000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            host: default_host(),
            port: default_port(),
            model_path: default_model_path(),
            model_format: None,
            model_sha256: None,
            model_version: None,
            onnx_output_index: None,
            threshold: default_threshold(),
            strict_numbers: false,
            include_label: false,
            inference_timeout_ms: default_inference_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional `predictor.*` file and `PREDICTOR_*` env vars
    pub fn load() -> Result<Self> {
        Self::load_from(
            config::File::with_name("predictor").required(false),
            config::Environment::with_prefix("PREDICTOR").try_parsing(true),
        )
    }

    fn load_from<F, E>(file: F, env: E) -> Result<Self>
    where
        F: config::Source + Send + Sync + 'static,
        E: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()
            .context("Failed to read configuration")?;

        let config: ServerConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            anyhow::bail!("threshold {} must be in [0, 1]", self.threshold);
        }
        if self.inference_timeout_ms == 0 {
            anyhow::bail!("inference_timeout_ms must be positive");
        }
        Ok(())
    }

    pub fn model_format(&self) -> ModelFormat {
        self.model_format
            .unwrap_or_else(|| ModelFormat::from_path(&self.model_path))
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            threshold: self.threshold,
            strict_numbers: self.strict_numbers,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }
}
