//! Agent configuration

use anyhow::{Context, Result};
use attrition_lib::ArtifactPaths;
use serde::Deserialize;
use std::path::PathBuf;

/// Optional config file, looked up in the working directory
const CONFIG_FILE: &str = "attrition-agent";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Instance name used in logs
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port for predictions, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Fitted scaler artifact
    #[serde(default = "default_scaler_path")]
    pub scaler_path: PathBuf,

    /// Fitted classifier artifact
    #[serde(default = "default_classifier_path")]
    pub classifier_path: PathBuf,

    /// Expected hex SHA-256 of the scaler file
    #[serde(default)]
    pub scaler_sha256: Option<String>,

    /// Expected hex SHA-256 of the classifier file
    #[serde(default)]
    pub classifier_sha256: Option<String>,

    /// Load artifacts before serving instead of on the first request
    #[serde(default = "default_warm_on_start")]
    pub warm_on_start: bool,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "attrition-agent".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_scaler_path() -> PathBuf {
    PathBuf::from("artifacts/scaler.json")
}

fn default_classifier_path() -> PathBuf {
    PathBuf::from("artifacts/classifier.json")
}

fn default_warm_on_start() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            scaler_path: default_scaler_path(),
            classifier_path: default_classifier_path(),
            scaler_sha256: None,
            classifier_sha256: None,
            warm_on_start: default_warm_on_start(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from `attrition-agent.toml` and `ATTRITION_*` variables
    pub fn load() -> Result<Self> {
        Self::from_sources(config::File::with_name(CONFIG_FILE).required(false))
    }

    fn from_sources(file: config::File<config::FileSourceFile, config::FileFormat>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("ATTRITION"))
            .build()
            .context("failed to read agent configuration")?;

        config
            .try_deserialize()
            .context("invalid agent configuration")
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            scaler: self.scaler_path.clone(),
            classifier: self.classifier_path.clone(),
            scaler_sha256: self.scaler_sha256.clone(),
            classifier_sha256: self.classifier_sha256.clone(),
        }
    }
}
