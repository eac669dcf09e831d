//! Employee attrition prediction library
//!
//! This crate provides the core functionality for:
//! - Loading the fitted scaler and classifier artifacts once per process
//! - Encoding raw employee records into the training-time feature layout
//! - Scaling and classifying encoded records
//! - Health checks and observability

pub mod artifacts;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod predictor;

pub use artifacts::{
    compute_checksum, ArtifactCache, ArtifactPaths, ArtifactSource, FileArtifactSource,
    LoadedArtifacts,
};
pub use error::{PipelineError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AttritionMetrics, StructuredLogger};
pub use pipeline::Pipeline;
