//! Error taxonomy for the prediction pipeline

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors produced by the attrition prediction pipeline.
///
/// Only [`PipelineError::ArtifactLoad`] is fatal: without both artifacts no
/// prediction can be served. Every other variant aborts a single request and
/// leaves the cached artifacts untouched.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// A scaler or classifier artifact is missing, corrupt or inconsistent
    #[error("failed to load artifacts: {0}")]
    ArtifactLoad(String),

    /// A raw input field is outside its declared bounds
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Column count or order does not match what the artifacts were fit on
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The scaling transform failed for a reason other than shape
    #[error("transform failed: {0}")]
    Transform(String),

    /// The classifier failed or returned an inconsistent answer
    #[error("inference failed: {0}")]
    Inference(String),
}

impl PipelineError {
    /// Stable, machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ArtifactLoad(_) => "artifact_load",
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::SchemaMismatch(_) => "schema_mismatch",
            PipelineError::Transform(_) => "transform",
            PipelineError::Inference(_) => "inference",
        }
    }

    /// Returns true if the process cannot serve predictions after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::ArtifactLoad(_))
    }

    pub(crate) fn artifact(msg: impl Into<String>) -> Self {
        PipelineError::ArtifactLoad(msg.into())
    }

    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        PipelineError::SchemaMismatch(msg.into())
    }

    /// Promote an error raised while assembling artifacts to a load failure.
    ///
    /// An artifact pair that fails validation can never serve a prediction,
    /// so the failure is fatal regardless of its original kind.
    pub(crate) fn at_load(self) -> Self {
        match self {
            PipelineError::ArtifactLoad(_) => self,
            other => PipelineError::ArtifactLoad(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_artifact_load_is_fatal() {
        assert!(PipelineError::ArtifactLoad("x".into()).is_fatal());
        assert!(!PipelineError::InvalidInput("x".into()).is_fatal());
        assert!(!PipelineError::SchemaMismatch("x".into()).is_fatal());
        assert!(!PipelineError::Transform("x".into()).is_fatal());
        assert!(!PipelineError::Inference("x".into()).is_fatal());
    }

    #[test]
    fn test_load_time_schema_error_is_fatal() {
        let err = PipelineError::schema("no baseline for MaritalStatus").at_load();
        assert!(err.is_fatal());
        assert_eq!(err.kind(), "artifact_load");
        assert_eq!(
            err.to_string(),
            "failed to load artifacts: schema mismatch: no baseline for MaritalStatus"
        );

        let load = PipelineError::artifact("scaler.json missing");
        assert_eq!(load.clone().at_load(), load);
    }

    #[test]
    fn test_display_includes_message() {
        let err = PipelineError::SchemaMismatch("expected 25 columns, got 24".into());
        assert_eq!(err.to_string(), "schema mismatch: expected 25 columns, got 24");
        assert_eq!(err.kind(), "schema_mismatch");
    }
}
