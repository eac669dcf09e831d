//! End-to-end prediction: validate, encode, scale, classify

use crate::artifacts::{ArtifactCache, LoadedArtifacts};
use crate::error::Result;
use crate::models::{EncodedFeatureVector, PredictionResult, RawInputRecord};
use crate::observability::{AttritionMetrics, StructuredLogger};
use crate::predictor::{InferenceEngine, InferenceStats};
use std::sync::Arc;
use std::time::Instant;

/// Runs raw records through the loaded artifacts.
///
/// Requests share nothing but the immutable artifacts, so a failed request
/// has no effect on the next one.
pub struct Pipeline {
    artifacts: Arc<ArtifactCache>,
    engine: InferenceEngine,
    metrics: AttritionMetrics,
    logger: StructuredLogger,
}

impl Pipeline {
    pub fn new(artifacts: Arc<ArtifactCache>) -> Self {
        Self {
            artifacts,
            engine: InferenceEngine::new(),
            metrics: AttritionMetrics::new(),
            logger: StructuredLogger::default(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Load the artifacts if needed and return them
    pub fn warm(&self) -> Result<Arc<LoadedArtifacts>> {
        let (loaded, loaded_here) = self.artifacts.get_or_load()?;
        if loaded_here {
            let classifier = loaded.classifier();
            self.metrics.observe_artifact_load(loaded.load_duration().as_secs_f64());
            self.metrics.set_classifier(
                classifier.version(),
                classifier.kind(),
                loaded.schema().len(),
            );
            self.logger.log_artifacts_loaded(
                &self.artifacts.describe(),
                loaded.schema().len(),
                classifier.kind(),
                classifier.version(),
                loaded.load_duration().as_millis() as u64,
            );
        }
        Ok(loaded)
    }

    /// Encode a record against the loaded schema without predicting
    pub fn encode(&self, record: &RawInputRecord) -> Result<EncodedFeatureVector> {
        record.validate()?;
        Ok(self.warm()?.encoder().encode(record))
    }

    /// Predict attrition for one raw record
    pub fn predict(&self, record: &RawInputRecord) -> Result<PredictionResult> {
        let start = Instant::now();
        let outcome = record
            .validate()
            .and_then(|_| self.warm())
            .and_then(|loaded| {
                let encoded = loaded.encoder().encode(record);
                self.classify(&loaded, &encoded)
            });
        self.observe(start, outcome)
    }

    /// Predict from an already encoded vector
    pub fn predict_encoded(&self, encoded: &EncodedFeatureVector) -> Result<PredictionResult> {
        let start = Instant::now();
        let outcome = self
            .warm()
            .and_then(|loaded| self.classify(&loaded, encoded));
        self.observe(start, outcome)
    }

    pub fn stats(&self) -> InferenceStats {
        self.engine.stats()
    }

    pub fn artifacts(&self) -> &Arc<ArtifactCache> {
        &self.artifacts
    }

    fn classify(
        &self,
        loaded: &LoadedArtifacts,
        encoded: &EncodedFeatureVector,
    ) -> Result<PredictionResult> {
        let scaled = loaded.scaler().transform(encoded)?;
        self.engine.infer(loaded.classifier(), &scaled)
    }

    fn observe(
        &self,
        start: Instant,
        outcome: Result<PredictionResult>,
    ) -> Result<PredictionResult> {
        let elapsed = start.elapsed();
        match &outcome {
            Ok(result) => {
                self.metrics.observe_prediction_latency(elapsed.as_secs_f64());
                self.metrics.inc_predictions(result.label.as_str());
                let version = self
                    .artifacts
                    .get_if_loaded()
                    .map(|a| a.classifier().version().to_string())
                    .unwrap_or_default();
                self.logger.log_prediction(
                    result.label.as_str(),
                    result.probability,
                    &version,
                    elapsed.as_micros() as u64,
                );
            }
            Err(e) => {
                self.metrics.inc_prediction_errors(e.kind());
                self.logger.log_rejection(e.kind(), &e.to_string());
            }
        }
        outcome
    }
}
