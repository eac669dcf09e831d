//! Health and readiness tracking for the prediction service
//!
//! Readiness means the artifacts are loaded and a prediction can be served.
//! Fatal pipeline errors fail the artifacts component. A single rejected
//! request changes nothing; the pipeline component degrades only when slow or
//! failed inferences pile up.

use crate::error::PipelineError;
use crate::predictor::InferenceStats;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
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

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|h| h.status)
            .fold(ComponentStatus::Healthy, |worst, s| match (worst, s) {
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

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Version of the classifier serving predictions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

/// Inferences observed before the pipeline component is judged
const MIN_INFERENCES_FOR_HEALTH: u64 = 20;

/// Share of slow or failed inferences that degrades the pipeline component
const DEGRADED_INFERENCE_RATIO: f64 = 0.1;

/// Component names for health tracking
pub mod components {
    pub const ARTIFACTS: &str = "artifacts";
    pub const PIPELINE: &str = "pipeline";
}

/// Shared registry of component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    model_version: Arc<RwLock<Option<String>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Record that artifacts are loaded and which model serves predictions
    pub async fn mark_artifacts_loaded(&self, model_version: impl Into<String>) {
        *self.model_version.write().await = Some(model_version.into());
        self.set_healthy(components::ARTIFACTS).await;
    }

    /// Reflect a pipeline error in component health.
    ///
    /// Fatal errors mark the artifacts unhealthy and withdraw readiness;
    /// per-request errors are ignored.
    pub async fn report_error(&self, error: &PipelineError) {
        if error.is_fatal() {
            *self.model_version.write().await = None;
            self.set_unhealthy(components::ARTIFACTS, error.to_string())
                .await;
        }
    }

    /// Degrade the pipeline component when too many inferences run slow or fail
    pub async fn record_inference(&self, stats: &InferenceStats) {
        if stats.total_inferences < MIN_INFERENCES_FOR_HEALTH {
            return;
        }
        let total = stats.total_inferences as f64;
        let slow = stats.slow_inferences as f64 / total;
        let failed = stats.failed_inferences as f64 / total;

        let health = if failed > DEGRADED_INFERENCE_RATIO {
            ComponentHealth::degraded(format!(
                "{} of {} inferences failed",
                stats.failed_inferences, stats.total_inferences
            ))
        } else if slow > DEGRADED_INFERENCE_RATIO {
            ComponentHealth::degraded(format!(
                "{} of {} inferences exceeded the latency target",
                stats.slow_inferences, stats.total_inferences
            ))
        } else {
            ComponentHealth::healthy()
        };

        let mut registered = self.components.write().await;
        let unchanged = registered
            .get(components::PIPELINE)
            .is_some_and(|h| h.status == health.status && h.message == health.message);
        if !unchanged {
            registered.insert(components::PIPELINE.to_string(), health);
        }
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let model_version = self.model_version.read().await.clone();
        let health = self.health().await;

        let reason = if model_version.is_none() {
            Some("Artifacts not loaded".to_string())
        } else if health.status == ComponentStatus::Unhealthy {
            Some("Critical component unhealthy".to_string())
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
            model_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_worst_status_wins() {
        let registry = HealthRegistry::new();
        registry.register(components::ARTIFACTS).await;
        registry.register(components::PIPELINE).await;

        registry.set_degraded(components::PIPELINE, "Slow inference").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry.set_unhealthy(components::ARTIFACTS, "Missing scaler").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_not_ready_until_artifacts_loaded() {
        let registry = HealthRegistry::new();
        registry.register(components::ARTIFACTS).await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Artifacts not loaded"));

        registry.mark_artifacts_loaded("2024.1").await;
        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        assert_eq!(readiness.model_version.as_deref(), Some("2024.1"));
    }

    #[tokio::test]
    async fn test_request_errors_do_not_affect_health() {
        let registry = HealthRegistry::new();
        registry.register(components::ARTIFACTS).await;
        registry.mark_artifacts_loaded("v1").await;

        registry
            .report_error(&PipelineError::SchemaMismatch("bad width".into()))
            .await;
        registry
            .report_error(&PipelineError::Inference("boom".into()))
            .await;

        assert!(registry.readiness().await.ready);
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_inference_stats_drive_pipeline_component() {
        let registry = HealthRegistry::new();
        registry.register(components::PIPELINE).await;

        let stats = |total, slow, failed| InferenceStats {
            total_inferences: total,
            slow_inferences: slow,
            failed_inferences: failed,
        };

        // too few samples to judge
        registry.record_inference(&stats(5, 5, 0)).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);

        registry.record_inference(&stats(100, 30, 0)).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::PIPELINE].message.as_deref(),
            Some("30 of 100 inferences exceeded the latency target")
        );

        registry.record_inference(&stats(100, 0, 20)).await;
        let health = registry.health().await;
        assert_eq!(
            health.components[components::PIPELINE].message.as_deref(),
            Some("20 of 100 inferences failed")
        );

        registry.record_inference(&stats(1000, 30, 20)).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_fatal_error_withdraws_readiness() {
        let registry = HealthRegistry::new();
        registry.register(components::ARTIFACTS).await;
        registry.mark_artifacts_loaded("v1").await;

        registry
            .report_error(&PipelineError::ArtifactLoad("scaler.json missing".into()))
            .await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.model_version.is_none());
        assert!(!registry.health().await.status.is_operational());
    }
}
