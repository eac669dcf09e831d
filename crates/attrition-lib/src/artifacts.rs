//! Artifact loading and the process-wide artifact cache
//!
//! This module provides:
//! - An [`ArtifactSource`] seam for reading the fitted scaler and classifier
//! - Checksum validation before deserializing artifact files
//! - An injectable single-initialization cache shared by every request

use crate::error::{PipelineError, Result};
use crate::models::FeatureSchema;
use crate::predictor::{
    BinaryClassifier, CategoryLayout, ClassifierArtifact, FeatureEncoder, FittedScaler,
    ScalerAdapter,
};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Storage backend for the two trained artifacts
pub trait ArtifactSource: Send + Sync {
    /// Read and deserialize the fitted scaler
    fn load_scaler(&self) -> Result<FittedScaler>;

    /// Read and deserialize the fitted classifier
    fn load_classifier(&self) -> Result<Box<dyn BinaryClassifier>>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Locations of the artifact files, with optional pinned checksums
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub scaler: PathBuf,
    pub classifier: PathBuf,
    /// Expected hex SHA-256 of the scaler file
    pub scaler_sha256: Option<String>,
    /// Expected hex SHA-256 of the classifier file
    pub classifier_sha256: Option<String>,
}

impl ArtifactPaths {
    pub fn new(scaler: impl Into<PathBuf>, classifier: impl Into<PathBuf>) -> Self {
        Self {
            scaler: scaler.into(),
            classifier: classifier.into(),
            scaler_sha256: None,
            classifier_sha256: None,
        }
    }
}

/// Reads JSON artifacts from the local filesystem
#[derive(Debug, Clone)]
pub struct FileArtifactSource {
    paths: ArtifactPaths,
}

impl FileArtifactSource {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }
}

impl ArtifactSource for FileArtifactSource {
    fn load_scaler(&self) -> Result<FittedScaler> {
        let bytes = read_verified(&self.paths.scaler, self.paths.scaler_sha256.as_deref())?;
        let scaler: FittedScaler = serde_json::from_slice(&bytes).map_err(|e| {
            PipelineError::artifact(format!(
                "corrupt scaler artifact {:?}: {}",
                self.paths.scaler, e
            ))
        })?;
        scaler.validate()?;
        Ok(scaler)
    }

    fn load_classifier(&self) -> Result<Box<dyn BinaryClassifier>> {
        let path = &self.paths.classifier;
        let bytes = read_verified(path, self.paths.classifier_sha256.as_deref())?;
        let artifact: ClassifierArtifact = serde_json::from_slice(&bytes).map_err(|e| {
            PipelineError::artifact(format!("corrupt classifier artifact {:?}: {}", path, e))
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        artifact.into_classifier(base_dir)
    }

    fn describe(&self) -> String {
        format!(
            "scaler={} classifier={}",
            self.paths.scaler.display(),
            self.paths.classifier.display()
        )
    }
}

/// Compute the hex SHA-256 of a byte slice
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn read_verified(path: &Path, expected_sha256: Option<&str>) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)
        .map_err(|e| PipelineError::artifact(format!("failed to read {:?}: {}", path, e)))?;

    if let Some(expected) = expected_sha256 {
        let computed = compute_checksum(&bytes);
        if !computed.eq_ignore_ascii_case(expected.trim()) {
            return Err(PipelineError::artifact(format!(
                "checksum mismatch for {:?}: expected {}, got {}",
                path, expected, computed
            )));
        }
        debug!(path = ?path, checksum = %computed, "Artifact checksum validated");
    }
    Ok(bytes)
}

/// Scaler, classifier and everything derived from their schema
pub struct LoadedArtifacts {
    schema: FeatureSchema,
    layout: CategoryLayout,
    encoder: FeatureEncoder,
    scaler: ScalerAdapter,
    classifier: Box<dyn BinaryClassifier>,
    load_duration: Duration,
    loaded_at: i64,
}

impl fmt::Debug for LoadedArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedArtifacts")
            .field("features", &self.schema.len())
            .field("scaler", &self.scaler.scaler().params.kind())
            .field("classifier", &self.classifier.kind())
            .field("version", &self.classifier.version())
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

impl LoadedArtifacts {
    /// Derive the schema, one-hot layout and encoder from a freshly loaded pair.
    ///
    /// Every failure here is an `ArtifactLoad` error: a pair whose schema
    /// cannot be laid out or scaled never serves a request.
    pub fn assemble(scaler: FittedScaler, classifier: Box<dyn BinaryClassifier>) -> Result<Self> {
        scaler.validate()?;
        let schema = FeatureSchema::new(classifier.feature_names().to_vec());
        let layout = CategoryLayout::resolve(&schema).map_err(PipelineError::at_load)?;
        let encoder = FeatureEncoder::new(&schema);
        let scaler = ScalerAdapter::new(scaler, &schema).map_err(PipelineError::at_load)?;
        Ok(Self {
            schema,
            layout,
            encoder,
            scaler,
            classifier,
            load_duration: Duration::ZERO,
            loaded_at: chrono::Utc::now().timestamp(),
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn layout(&self) -> &CategoryLayout {
        &self.layout
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn scaler(&self) -> &ScalerAdapter {
        &self.scaler
    }

    pub fn classifier(&self) -> &dyn BinaryClassifier {
        self.classifier.as_ref()
    }

    /// Wall time spent reading and assembling the artifacts
    pub fn load_duration(&self) -> Duration {
        self.load_duration
    }

    pub fn loaded_at(&self) -> i64 {
        self.loaded_at
    }
}

/// Thread-safe, load-once cache of the trained artifacts.
///
/// The first [`get`](Self::get) reads storage while holding a lock, so
/// concurrent first callers wait for a single load and then share its result.
/// A failed load is not cached.
pub struct ArtifactCache {
    source: Box<dyn ArtifactSource>,
    cell: OnceLock<Arc<LoadedArtifacts>>,
    init_lock: Mutex<()>,
}

impl ArtifactCache {
    pub fn new(source: impl ArtifactSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cell: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Cache backed by artifact files on disk
    pub fn from_paths(paths: ArtifactPaths) -> Self {
        Self::new(FileArtifactSource::new(paths))
    }

    /// Return the cached artifacts, loading them on first use
    pub fn get(&self) -> Result<Arc<LoadedArtifacts>> {
        self.get_or_load().map(|(loaded, _)| loaded)
    }

    /// Like [`get`](Self::get), also reporting whether this call ran the loader.
    ///
    /// Exactly one caller sees `true` per successful load, however many race
    /// on first use.
    pub fn get_or_load(&self) -> Result<(Arc<LoadedArtifacts>, bool)> {
        if let Some(loaded) = self.cell.get() {
            return Ok((loaded.clone(), false));
        }

        // The guarded section only touches the OnceLock, so a poisoned lock
        // carries no broken state.
        let _guard = self
            .init_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(loaded) = self.cell.get() {
            return Ok((loaded.clone(), false));
        }

        let loaded = Arc::new(self.load()?);
        let _ = self.cell.set(loaded.clone());
        Ok((loaded, true))
    }

    /// Cached artifacts, without triggering a load
    pub fn get_if_loaded(&self) -> Option<Arc<LoadedArtifacts>> {
        self.cell.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    fn load(&self) -> Result<LoadedArtifacts> {
        let start = Instant::now();
        let source = self.source.describe();
        info!(source = %source, "Loading artifacts");

        let result = self
            .source
            .load_scaler()
            .and_then(|scaler| Ok((scaler, self.source.load_classifier()?)))
            .and_then(|(scaler, classifier)| LoadedArtifacts::assemble(scaler, classifier));

        match result {
            Ok(mut loaded) => {
                loaded.load_duration = start.elapsed();
                info!(
                    source = %source,
                    features = loaded.schema.len(),
                    scaler = loaded.scaler.scaler().params.kind(),
                    classifier = loaded.classifier.kind(),
                    version = %loaded.classifier.version(),
                    elapsed_ms = loaded.load_duration.as_millis() as u64,
                    "Artifacts loaded"
                );
                Ok(loaded)
            }
            Err(e) => {
                error!(source = %source, error = %e, "Failed to load artifacts");
                Err(e)
            }
        }
    }
}
