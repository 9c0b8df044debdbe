//! Health check infrastructure for the prediction server
//!
//! Liveness reports per-component status; readiness is gated on the model
//! having been loaded. The classifier component degrades after a failed
//! inference and recovers on the next successful one.

use crate::error::InferenceError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Component names for health tracking
pub mod components {
    pub const CLASSIFIER: &str = "classifier";
    pub const API: &str = "api";
}

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, but the last operation failed
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    /// Healthy or degraded
    pub fn is_operational(&self) -> bool {
        !matches!(self, ComponentStatus::Unhealthy)
    }
}

/// Health of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failures since the last success
    #[serde(default, skip_serializing_if = "is_zero")]
    pub consecutive_failures: u32,
    pub last_check_timestamp: i64,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            consecutive_failures: 0,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Liveness body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across components; no components is healthy
    pub fn compute_status(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .fold(ComponentStatus::Healthy, |worst, status| match (worst, status) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            })
    }
}

/// Readiness body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

#[derive(Debug)]
struct RegistryState {
    components: BTreeMap<String, ComponentHealth>,
    /// Version of the loaded model; `None` until loading completes
    model_version: Option<String>,
}

/// Shared health state for the probe endpoints
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    /// Registry with the classifier and API components healthy, not yet ready
    pub fn new() -> Self {
        let components = [components::CLASSIFIER, components::API]
            .into_iter()
            .map(|name| (name.to_string(), ComponentHealth::healthy()))
            .collect();

        Self {
            state: Arc::new(RwLock::new(RegistryState {
                components,
                model_version: None,
            })),
        }
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), health);
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Readiness flips once the model is in memory
    pub async fn mark_model_loaded(&self, version: impl Into<String>) {
        self.state.write().await.model_version = Some(version.into());
    }

    /// Reflect an inference outcome on the classifier component
    pub async fn record_inference(&self, outcome: Result<(), &InferenceError>) {
        // Fast path: success on an already healthy classifier.
        if outcome.is_ok() {
            let state = self.state.read().await;
            let healthy = state
                .components
                .get(components::CLASSIFIER)
                .map_or(true, |c| c.status == ComponentStatus::Healthy);
            if healthy {
                return;
            }
        }

        let mut state = self.state.write().await;
        let entry = state
            .components
            .entry(components::CLASSIFIER.to_string())
            .or_insert_with(ComponentHealth::healthy);

        match outcome {
            Ok(()) => *entry = ComponentHealth::healthy(),
            Err(err) => {
                let failures = entry.consecutive_failures.saturating_add(1);
                *entry = ComponentHealth::degraded(err.to_string());
                entry.consecutive_failures = failures;
            }
        }
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let status = HealthResponse::compute_status(&state.components);

        let reason = match (&state.model_version, status) {
            (None, _) => Some("Model not yet loaded".to_string()),
            (Some(_), ComponentStatus::Unhealthy) => {
                Some("Critical component unhealthy".to_string())
            }
            _ => None,
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
            model_version: state.model_version.clone(),
        }
    }
}
