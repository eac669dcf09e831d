//! CLI commands and where they get predictions from

pub mod predict;
pub mod schema;

use anyhow::{bail, Result};
use attrition_lib::{ArtifactCache, ArtifactPaths, Pipeline};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::client::ApiClient;
use crate::config::Config;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Prediction backend selected from flags and the config file
pub enum Source {
    /// A running attrition agent
    Remote(ApiClient),
    /// Artifacts loaded into this process
    Local(Pipeline),
}

/// Flags that select the prediction backend
#[derive(Debug, Clone, Default)]
pub struct SourceArgs {
    pub api_url: Option<String>,
    pub scaler: Option<PathBuf>,
    pub classifier: Option<PathBuf>,
}

impl Source {
    /// Pick a backend.
    ///
    /// Artifact flags win over an agent URL; config file entries fill in
    /// whatever the flags leave out.
    pub fn resolve(args: &SourceArgs, config: &Config) -> Result<Self> {
        if args.scaler.is_some() || args.classifier.is_some() {
            let scaler = args.scaler.clone().or_else(|| config.scaler_path.clone());
            let classifier = args
                .classifier
                .clone()
                .or_else(|| config.classifier_path.clone());
            return match (scaler, classifier) {
                (Some(scaler), Some(classifier)) => Ok(Self::local(scaler, classifier)),
                _ => bail!("--scaler and --classifier must be given together"),
            };
        }

        if let Some(url) = args.api_url.as_ref().or(config.api_url.as_ref()) {
            debug!(url = %url, "Using attrition agent");
            return Ok(Source::Remote(ApiClient::new(url)?));
        }

        if let (Some(scaler), Some(classifier)) = (&config.scaler_path, &config.classifier_path) {
            return Ok(Self::local(scaler.clone(), classifier.clone()));
        }

        debug!(url = DEFAULT_API_URL, "Using default attrition agent");
        Ok(Source::Remote(ApiClient::new(DEFAULT_API_URL)?))
    }

    fn local(scaler: PathBuf, classifier: PathBuf) -> Self {
        debug!(scaler = ?scaler, classifier = ?classifier, "Using local artifacts");
        let cache = ArtifactCache::from_paths(ArtifactPaths::new(scaler, classifier));
        Source::Local(Pipeline::new(Arc::new(cache)))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Source::Local(_))
    }
}
