//! Observability infrastructure for the attrition predictor
//!
//! Provides:
//! - Prometheus metrics (prediction latency, outcomes, errors, artifact info)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter_vec, register_int_gauge,
    GaugeVec, Histogram, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AttritionMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct AttritionMetricsInner {
    prediction_latency_seconds: Histogram,
    artifact_load_seconds: Histogram,
    predictions_total: IntCounterVec,
    prediction_errors_total: IntCounterVec,
    classifier_info: GaugeVec,
    schema_features: IntGauge,
}

impl AttritionMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "attrition_prediction_latency_seconds",
                "Time spent encoding, scaling and classifying one record",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            artifact_load_seconds: register_histogram!(
                "attrition_artifact_load_seconds",
                "Time spent loading the scaler and classifier artifacts",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register artifact_load_seconds"),

            predictions_total: register_int_counter_vec!(
                "attrition_predictions_total",
                "Predictions served, by label",
                &["label"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "attrition_prediction_errors_total",
                "Prediction requests that failed, by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            classifier_info: register_gauge_vec!(
                "attrition_classifier_info",
                "Information about the currently loaded classifier",
                &["version", "kind"]
            )
            .expect("Failed to register classifier_info"),

            schema_features: register_int_gauge!(
                "attrition_schema_features",
                "Number of features in the loaded classifier schema"
            )
            .expect("Failed to register schema_features"),
        }
    }
}

/// Prometheus metrics for the prediction pipeline
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AttritionMetrics {
    _private: (),
}

impl Default for AttritionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AttritionMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AttritionMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AttritionMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_artifact_load(&self, duration_secs: f64) {
        self.inner().artifact_load_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, label: &str) {
        self.inner().predictions_total.with_label_values(&[label]).inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Update loaded classifier info
    pub fn set_classifier(&self, version: &str, kind: &str, features: usize) {
        self.inner().classifier_info.reset();
        self.inner()
            .classifier_info
            .with_label_values(&[version, kind])
            .set(1.0);
        self.inner().schema_features.set(features as i64);
    }
}

/// Structured logger for pipeline events
///
/// Provides consistent JSON-formatted logging for predictions,
/// rejected requests and lifecycle events.
#[derive(Clone, Debug)]
pub struct StructuredLogger {
    instance: String,
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new("attrition")
    }
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Log a served prediction
    pub fn log_prediction(
        &self,
        label: &str,
        probability: f64,
        model_version: &str,
        duration_us: u64,
    ) {
        info!(
            event = "prediction_generated",
            instance = %self.instance,
            label = %label,
            probability = probability,
            model_version = %model_version,
            duration_us = duration_us,
            "Generated attrition prediction"
        );
    }

    /// Log a request that produced no prediction
    pub fn log_rejection(&self, kind: &str, message: &str) {
        warn!(
            event = "prediction_rejected",
            instance = %self.instance,
            kind = %kind,
            message = %message,
            "Prediction request rejected"
        );
    }

    /// Log a completed artifact load
    pub fn log_artifacts_loaded(
        &self,
        source: &str,
        features: usize,
        classifier_kind: &str,
        model_version: &str,
        duration_ms: u64,
    ) {
        info!(
            event = "artifacts_loaded",
            instance = %self.instance,
            source = %source,
            features = features,
            classifier = %classifier_kind,
            model_version = %model_version,
            duration_ms = duration_ms,
            "Scaler and classifier ready"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, source: &str) {
        info!(
            event = "agent_started",
            instance = %self.instance,
            agent_version = %version,
            artifacts = %source,
            "Attrition agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Attrition agent shutting down"
        );
    }
}
