//! HTTP API for predictions, health checks and Prometheus metrics

use attrition_lib::{
    health::{ComponentStatus, HealthRegistry},
    predictor::CategoryLayout,
    LoadedArtifacts, Pipeline, PipelineError, PredictionResult, RawInputRecord,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, health_registry: HealthRegistry) -> Self {
        Self {
            pipeline,
            health_registry,
        }
    }
}

/// Error body returned for any failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// Pipeline error carried out of a handler
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self(e)
    }
}

pub fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::ArtifactLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::InvalidInput(_)
        | PipelineError::SchemaMismatch(_)
        | PipelineError::Transform(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.0.kind(),
            message: self.0.to_string(),
        };
        (status_for(&self.0), Json(body)).into_response()
    }
}

/// Schema description returned by `/api/v1/schema`
#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub features: Vec<String>,
    pub threshold: f64,
    pub classifier: &'static str,
    pub version: String,
    pub layout: CategoryLayout,
}

impl SchemaResponse {
    fn from_artifacts(artifacts: &LoadedArtifacts) -> Self {
        let classifier = artifacts.classifier();
        Self {
            features: artifacts.schema().names().to_vec(),
            threshold: classifier.threshold(),
            classifier: classifier.kind(),
            version: classifier.version().to_string(),
            layout: artifacts.layout().clone(),
        }
    }
}

/// Run blocking pipeline work off the async executor
async fn run_blocking<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Pipeline) -> attrition_lib::Result<T> + Send + 'static,
{
    let pipeline = Arc::clone(&state.pipeline);
    let outcome = tokio::task::spawn_blocking(move || work(&pipeline))
        .await
        .map_err(|e| PipelineError::Inference(format!("prediction task failed: {}", e)))?;
    state
        .health_registry
        .record_inference(&state.pipeline.stats())
        .await;

    match outcome {
        Ok(value) => {
            mark_loaded(state).await;
            Ok(value)
        }
        Err(e) => {
            state.health_registry.report_error(&e).await;
            Err(e.into())
        }
    }
}

/// Flip readiness the first time artifacts are observed loaded
async fn mark_loaded(state: &AppState) {
    if state.health_registry.readiness().await.model_version.is_some() {
        return;
    }
    if let Some(artifacts) = state.pipeline.artifacts().get_if_loaded() {
        let version = artifacts.classifier().version().to_string();
        info!(model_version = %version, "Artifacts loaded on demand");
        state.health_registry.mark_artifacts_loaded(version).await;
    }
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Json(record): Json<RawInputRecord>,
) -> Result<Json<PredictionResult>, ApiError> {
    let result = run_blocking(&state, move |pipeline| pipeline.predict(&record)).await?;
    Ok(Json(result))
}

async fn schema(State(state): State<Arc<AppState>>) -> Result<Json<SchemaResponse>, ApiError> {
    let artifacts = run_blocking(&state, |pipeline| pipeline.warm()).await?;
    Ok(Json(SchemaResponse::from_artifacts(&artifacts)))
}

/// Health check response - returns 200 if healthy, 503 if degraded/unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/predict", post(predict))
        .route("/api/v1/schema", get(schema))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
