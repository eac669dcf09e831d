//! Attrition Agent - Employee attrition prediction service
//!
//! Loads the fitted scaler and classifier once and serves predictions,
//! health checks and metrics over HTTP.

use anyhow::{Context, Result};
use attrition_lib::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    ArtifactCache, Pipeline,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting attrition-agent");

    let config = config::AgentConfig::load()?;
    info!(instance = %config.instance_name, port = config.api_port, "Agent configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::ARTIFACTS).await;
    health_registry.register(components::PIPELINE).await;

    let logger = StructuredLogger::new(&config.instance_name);
    let cache = Arc::new(ArtifactCache::from_paths(config.artifact_paths()));
    logger.log_startup(AGENT_VERSION, &cache.describe());

    let pipeline = Arc::new(Pipeline::new(cache).with_logger(logger.clone()));

    if config.warm_on_start {
        let warm = Arc::clone(&pipeline);
        let loaded = tokio::task::spawn_blocking(move || warm.warm())
            .await
            .context("artifact warm-up task panicked")?;

        match loaded {
            Ok(artifacts) => {
                health_registry
                    .mark_artifacts_loaded(artifacts.classifier().version())
                    .await;
            }
            Err(e) => {
                error!(error = %e, "Artifact warm-up failed");
                health_registry.report_error(&e).await;
                logger.log_shutdown("artifact load failed");
                return Err(e).context("failed to load artifacts");
            }
        }
    }

    let app_state = Arc::new(api::AppState::new(pipeline, health_registry.clone()));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = api_handle => {
            let reason = match result {
                Ok(Ok(())) => "API server stopped".to_string(),
                Ok(Err(e)) => format!("API server failed: {}", e),
                Err(e) => format!("API server task panicked: {}", e),
            };
            logger.log_shutdown(&reason);
            anyhow::bail!(reason);
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
