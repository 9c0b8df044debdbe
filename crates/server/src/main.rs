//! Diabetes Predictor - health-indicator classification server
//!
//! Loads a trained binary classifier once at startup and serves
//! predictions, health probes and Prometheus metrics over HTTP.

use anyhow::{Context, Result};
use diabetes_predictor::{api, config::ServerConfig, model};
use predictor_lib::{
    health::HealthRegistry,
    observability::{ServingMetrics, StructuredLogger},
    FeatureSchema, PredictionService, ResponseFormatter,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting diabetes-predictor");

    // Load configuration
    let config = ServerConfig::load()?;
    info!(
        instance = %config.instance_name,
        model_path = ?config.model_path,
        threshold = config.threshold,
        "Server configured"
    );

    let logger = StructuredLogger::new(&config.instance_name);

    // Initialize health registry
    let health_registry = HealthRegistry::new();

    // Schema and model are loaded once; failures here abort startup
    let schema = FeatureSchema::diabetes_indicators();
    let classifier = model::load_classifier(&config, &schema)?;
    let model_version = classifier.model_version();
    let format = config.model_format().as_str();
    logger.log_model_loaded(&config.model_path.display().to_string(), format, &model_version);

    let metrics = ServingMetrics::new();
    metrics.set_model_version(&model_version, format);

    let service = PredictionService::new(schema, classifier, config.service_config())
        .context("Invalid prediction service configuration")?;
    logger.log_startup(SERVER_VERSION, &model_version, service.threshold());

    // Create shared application state
    let app_state = Arc::new(
        api::AppState::new(Arc::new(service), health_registry.clone(), metrics, logger.clone())
            .with_formatter(ResponseFormatter::with_label(config.include_label))
            .with_inference_timeout(config.inference_timeout()),
    );

    // Mark server as ready after initialization
    health_registry.mark_model_loaded(&model_version).await;

    api::serve(&config.bind_addr(), app_state, shutdown_signal(logger)).await?;
    info!("Shutting down");

    Ok(())
}

async fn shutdown_signal(logger: StructuredLogger) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    logger.log_shutdown("SIGINT received");
}
