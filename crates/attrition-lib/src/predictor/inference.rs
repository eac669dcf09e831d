//! Classifier implementations and the inference engine
//!
//! Two model families are supported: a plain logistic regression stored as
//! JSON coefficients, and any binary classifier exported to ONNX, run with
//! tract-onnx.

use super::BinaryClassifier;
use crate::error::{PipelineError, Result};
use crate::models::{AttritionLabel, PredictionResult, ScaledFeatureVector};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Default decision threshold on P(WillLeave)
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Maximum inference latency before warning (5ms target)
const MAX_INFERENCE_MS: u128 = 5;

/// Tolerance when checking that class probabilities sum to one
const PROBA_SUM_TOLERANCE: f64 = 1e-6;

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

/// Classifier artifact as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierArtifact {
    LogisticRegression {
        feature_names_in: Vec<String>,
        coef: Vec<f64>,
        intercept: f64,
        #[serde(default = "default_threshold")]
        threshold: f64,
        #[serde(default)]
        version: Option<String>,
    },
    Onnx {
        feature_names_in: Vec<String>,
        /// Relative paths are resolved against the artifact's directory
        model_path: PathBuf,
        /// Graph output holding class probabilities
        #[serde(default)]
        probability_output: Option<usize>,
        #[serde(default = "default_threshold")]
        threshold: f64,
        #[serde(default)]
        version: Option<String>,
    },
}

impl ClassifierArtifact {
    /// Build a runnable classifier; `base_dir` anchors relative model paths
    pub fn into_classifier(self, base_dir: &Path) -> Result<Box<dyn BinaryClassifier>> {
        match self {
            ClassifierArtifact::LogisticRegression {
                feature_names_in,
                coef,
                intercept,
                threshold,
                version,
            } => {
                let model = LogisticRegression::new(
                    feature_names_in,
                    coef,
                    intercept,
                    threshold,
                    version.unwrap_or_else(|| "unversioned".to_string()),
                )?;
                Ok(Box::new(model))
            }
            ClassifierArtifact::Onnx {
                feature_names_in,
                model_path,
                probability_output,
                threshold,
                version,
            } => {
                let path = if model_path.is_absolute() {
                    model_path
                } else {
                    base_dir.join(model_path)
                };
                let bytes = std::fs::read(&path).map_err(|e| {
                    PipelineError::artifact(format!("failed to read ONNX model {:?}: {}", path, e))
                })?;
                let model = OnnxClassifier::new(
                    &bytes,
                    feature_names_in,
                    probability_output,
                    threshold,
                    version.unwrap_or_else(|| "unversioned".to_string()),
                )?;
                Ok(Box::new(model))
            }
        }
    }
}

fn check_threshold(threshold: f64) -> Result<()> {
    if !(threshold > 0.0 && threshold < 1.0) {
        return Err(PipelineError::artifact(format!(
            "decision threshold must lie in (0, 1), got {}",
            threshold
        )));
    }
    Ok(())
}

fn check_features(feature_names: &[String]) -> Result<()> {
    if feature_names.is_empty() {
        return Err(PipelineError::artifact("classifier has an empty feature schema"));
    }
    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = feature_names.iter().find(|n| !seen.insert(n.as_str())) {
        return Err(PipelineError::artifact(format!(
            "classifier schema lists {:?} twice",
            dup
        )));
    }
    Ok(())
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Binary logistic regression: P(WillLeave) = sigmoid(coef · x + intercept)
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    feature_names: Vec<String>,
    coef: Vec<f64>,
    intercept: f64,
    threshold: f64,
    version: String,
}

impl LogisticRegression {
    pub fn new(
        feature_names: Vec<String>,
        coef: Vec<f64>,
        intercept: f64,
        threshold: f64,
        version: String,
    ) -> Result<Self> {
        check_features(&feature_names)?;
        check_threshold(threshold)?;
        if coef.len() != feature_names.len() {
            return Err(PipelineError::artifact(format!(
                "classifier has {} coefficients for {} features",
                coef.len(),
                feature_names.len()
            )));
        }
        if !intercept.is_finite() || coef.iter().any(|c| !c.is_finite()) {
            return Err(PipelineError::artifact("classifier has non-finite coefficients"));
        }
        Ok(Self {
            feature_names,
            coef,
            intercept,
            threshold,
            version,
        })
    }

    /// Raw log-odds of attrition for one row
    pub fn decision_function(&self, features: &[f64]) -> f64 {
        self.coef
            .iter()
            .zip(features)
            .map(|(c, x)| c * x)
            .sum::<f64>()
            + self.intercept
    }
}

impl BinaryClassifier for LogisticRegression {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2]> {
        if features.len() != self.coef.len() {
            return Err(PipelineError::Inference(format!(
                "expected {} features, got {}",
                self.coef.len(),
                features.len()
            )));
        }
        let leave = sigmoid(self.decision_function(features));
        Ok([1.0 - leave, leave])
    }

    fn kind(&self) -> &'static str {
        "logistic_regression"
    }

    fn version(&self) -> &str {
        &self.version
    }
}

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX-exported binary classifier run with tract
pub struct OnnxClassifier {
    model: TractModel,
    feature_names: Vec<String>,
    probability_output: Option<usize>,
    threshold: f64,
    version: String,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("features", &self.feature_names.len())
            .field("probability_output", &self.probability_output)
            .field("threshold", &self.threshold)
            .field("version", &self.version)
            .finish()
    }
}

impl OnnxClassifier {
    pub fn new(
        model_bytes: &[u8],
        feature_names: Vec<String>,
        probability_output: Option<usize>,
        threshold: f64,
        version: String,
    ) -> Result<Self> {
        check_features(&feature_names)?;
        check_threshold(threshold)?;
        let model = Self::load_model(model_bytes, feature_names.len())
            .map_err(|e| PipelineError::artifact(format!("invalid ONNX model: {:#}", e)))?;
        Ok(Self {
            model,
            feature_names,
            probability_output,
            threshold,
            version,
        })
    }

    /// Load and optimize an ONNX model from bytes
    fn load_model(model_bytes: &[u8], num_features: usize) -> TractResult<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))?
            .with_input_fact(0, f32::fact([1, num_features]).into())?
            .into_optimized()?
            .into_runnable()?;
        Ok(model)
    }

    fn run(&self, features: &[f64]) -> TractResult<Vec<f32>> {
        let data: Vec<f32> = features.iter().map(|v| *v as f32).collect();
        let input: Tensor =
            tract_ndarray::Array2::from_shape_vec((1, self.feature_names.len()), data)?.into();

        let outputs = self.model.run(tvec!(input.into()))?;
        let index = self
            .probability_output
            .unwrap_or(if outputs.len() > 1 { 1 } else { 0 });
        let output = outputs
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("model has no output #{}", index))?;
        let view = output.to_array_view::<f32>()?;
        Ok(view.iter().copied().collect())
    }
}

impl BinaryClassifier for OnnxClassifier {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2]> {
        if features.len() != self.feature_names.len() {
            return Err(PipelineError::Inference(format!(
                "expected {} features, got {}",
                self.feature_names.len(),
                features.len()
            )));
        }
        let values = self
            .run(features)
            .map_err(|e| PipelineError::Inference(format!("{:#}", e)))?;
        match values.as_slice() {
            [stay, leave] => Ok([*stay as f64, *leave as f64]),
            [leave] => Ok([1.0 - *leave as f64, *leave as f64]),
            other => Err(PipelineError::Inference(format!(
                "probability output has {} values, expected 1 or 2",
                other.len()
            ))),
        }
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }

    fn version(&self) -> &str {
        &self.version
    }
}

/// Inference statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
    pub failed_inferences: u64,
}

/// Turns scaled vectors into checked predictions
#[derive(Debug, Default)]
pub struct InferenceEngine {
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
    failed_inference_count: AtomicU64,
}

impl InferenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn infer(
        &self,
        classifier: &dyn BinaryClassifier,
        scaled: &ScaledFeatureVector,
    ) -> Result<PredictionResult> {
        let start = Instant::now();
        let result = self.infer_checked(classifier, scaled);
        let elapsed = start.elapsed();

        self.inference_count.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.failed_inference_count.fetch_add(1, Ordering::Relaxed);
        }
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }
        result
    }

    fn infer_checked(
        &self,
        classifier: &dyn BinaryClassifier,
        scaled: &ScaledFeatureVector,
    ) -> Result<PredictionResult> {
        let expected = classifier.feature_names().len();
        if scaled.len() != expected {
            return Err(PipelineError::schema(format!(
                "classifier expects {} features, got {}",
                expected,
                scaled.len()
            )));
        }

        let label = classifier.predict(scaled.values())?;
        let [stay, leave] = classifier.predict_proba(scaled.values())?;

        if !leave.is_finite() || !(0.0..=1.0).contains(&leave) {
            return Err(PipelineError::Inference(format!(
                "attrition probability {} is outside [0, 1]",
                leave
            )));
        }
        if ((stay + leave) - 1.0).abs() > PROBA_SUM_TOLERANCE {
            return Err(PipelineError::Inference(format!(
                "class probabilities sum to {}, not 1",
                stay + leave
            )));
        }
        let threshold = classifier.threshold();
        if label != AttritionLabel::from_probability(leave, threshold) {
            return Err(PipelineError::Inference(format!(
                "label {} disagrees with probability {} at threshold {}",
                label, leave, threshold
            )));
        }

        Ok(PredictionResult {
            label,
            probability: leave,
        })
    }

    /// Get inference statistics
    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
            failed_inferences: self.failed_inference_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    fn model(coef: Vec<f64>, intercept: f64) -> LogisticRegression {
        let n = coef.len();
        LogisticRegression::new(names(n), coef, intercept, DEFAULT_THRESHOLD, "test".into())
            .unwrap()
    }

    /// Classifier whose label ignores its own probability
    struct Contrarian;

    impl BinaryClassifier for Contrarian {
        fn feature_names(&self) -> &[String] {
            &[]
        }
        fn threshold(&self) -> f64 {
            0.5
        }
        fn predict_proba(&self, _: &[f64]) -> Result<[f64; 2]> {
            Ok([0.9, 0.1])
        }
        fn predict(&self, _: &[f64]) -> Result<AttritionLabel> {
            Ok(AttritionLabel::WillLeave)
        }
        fn kind(&self) -> &'static str {
            "contrarian"
        }
        fn version(&self) -> &str {
            "0"
        }
    }

    #[test]
    fn test_sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(-800.0).is_finite());
    }

    #[test]
    fn test_logistic_probabilities() {
        let lr = model(vec![2.0, -1.0], 0.0);
        let [stay, leave] = lr.predict_proba(&[1.0, 2.0]).unwrap();
        assert_eq!(leave, 0.5);
        assert_eq!(stay, 0.5);
        assert_eq!(lr.predict(&[1.0, 2.0]).unwrap(), AttritionLabel::WillLeave);
        assert_eq!(lr.predict(&[0.0, 1.0]).unwrap(), AttritionLabel::WillStay);
    }

    #[test]
    fn test_engine_label_matches_threshold() {
        let engine = InferenceEngine::new();
        let lr = model(vec![1.0], 0.0);
        for x in [-3.0, -0.1, 0.0, 0.1, 3.0] {
            let result = engine.infer(&lr, &ScaledFeatureVector(vec![x])).unwrap();
            assert!((0.0..=1.0).contains(&result.probability));
            assert_eq!(result.will_leave(), result.probability >= DEFAULT_THRESHOLD);
        }
        assert_eq!(engine.stats().total_inferences, 5);
        assert_eq!(engine.stats().failed_inferences, 0);
    }

    #[test]
    fn test_custom_threshold() {
        let lr = LogisticRegression::new(names(1), vec![1.0], 0.0, 0.7, "t".into()).unwrap();
        let engine = InferenceEngine::new();
        // sigmoid(0.5) ~= 0.62
        let result = engine.infer(&lr, &ScaledFeatureVector(vec![0.5])).unwrap();
        assert_eq!(result.label, AttritionLabel::WillStay);
        assert!(result.probability > 0.5);
    }

    #[test]
    fn test_engine_rejects_inconsistent_label() {
        let engine = InferenceEngine::new();
        let err = engine
            .infer(&Contrarian, &ScaledFeatureVector(vec![]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Inference(_)));
        assert_eq!(engine.stats().failed_inferences, 1);
    }

    #[test]
    fn test_engine_rejects_wrong_width() {
        let engine = InferenceEngine::new();
        let lr = model(vec![1.0, 1.0], 0.0);
        let err = engine.infer(&lr, &ScaledFeatureVector(vec![1.0])).unwrap_err();
        assert_eq!(err.kind(), "schema_mismatch");
    }

    #[test]
    fn test_artifact_validation() {
        assert!(LogisticRegression::new(names(2), vec![1.0], 0.0, 0.5, "v".into()).is_err());
        assert!(LogisticRegression::new(names(1), vec![1.0], 0.0, 1.0, "v".into()).is_err());
        assert!(LogisticRegression::new(names(1), vec![f64::NAN], 0.0, 0.5, "v".into()).is_err());
        let dup = vec!["Age".to_string(), "Age".to_string()];
        assert!(LogisticRegression::new(dup, vec![1.0, 1.0], 0.0, 0.5, "v".into()).is_err());
    }

    #[test]
    fn test_classifier_artifact_json() {
        let json = r#"{
            "kind": "logistic_regression",
            "feature_names_in": ["Age", "OverTime"],
            "coef": [-0.4, 0.9],
            "intercept": -1.5,
            "version": "2024.1"
        }"#;
        let artifact: ClassifierArtifact = serde_json::from_str(json).unwrap();
        let classifier = artifact.into_classifier(Path::new(".")).unwrap();
        assert_eq!(classifier.kind(), "logistic_regression");
        assert_eq!(classifier.version(), "2024.1");
        assert_eq!(classifier.threshold(), DEFAULT_THRESHOLD);
        assert_eq!(classifier.feature_names().len(), 2);
    }

    #[test]
    fn test_onnx_artifact_missing_model_file() {
        let artifact = ClassifierArtifact::Onnx {
            feature_names_in: names(3),
            model_path: PathBuf::from("does-not-exist.onnx"),
            probability_output: None,
            threshold: DEFAULT_THRESHOLD,
            version: None,
        };
        let err = artifact.into_classifier(Path::new("/nonexistent")).err().expect("expected into_classifier to fail");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_onnx_rejects_garbage_bytes() {
        let err = OnnxClassifier::new(b"not a model", names(2), None, 0.5, "v".into()).unwrap_err();
        assert_eq!(err.kind(), "artifact_load");
    }

    fn fixture(name: &str) -> Vec<u8> {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name);
        std::fs::read(path).unwrap()
    }

    fn onnx(name: &str, probability_output: Option<usize>) -> OnnxClassifier {
        OnnxClassifier::new(&fixture(name), names(3), probability_output, 0.5, "onnx-test".into())
            .unwrap()
    }

    fn sigmoid_of(z: f64) -> f64 {
        1.0 / (1.0 + (-z).exp())
    }

    #[test]
    fn test_onnx_single_probability_output() {
        // one output: sigmoid(x0 - x1 + 0.5 * x2)
        let model = onnx("sigmoid_3.onnx", None);
        let [stay, leave] = model.predict_proba(&[2.0, 0.0, 0.0]).unwrap();
        assert!((leave - sigmoid_of(2.0)).abs() < 1e-5);
        assert!((stay + leave - 1.0).abs() < 1e-12);

        let result = InferenceEngine::new()
            .infer(&model, &ScaledFeatureVector(vec![0.0, 2.0, 0.0]))
            .unwrap();
        assert_eq!(result.label, AttritionLabel::WillStay);
        assert!((result.probability - sigmoid_of(-2.0)).abs() < 1e-5);
    }

    #[test]
    fn test_onnx_defaults_to_second_output_of_two() {
        // outputs: logits [0, z], then softmax probabilities
        let model = onnx("softmax_3.onnx", None);
        let [stay, leave] = model.predict_proba(&[1.0, 0.0, 2.0]).unwrap();
        assert!((leave - sigmoid_of(2.0)).abs() < 1e-5);
        assert!((stay - sigmoid_of(-2.0)).abs() < 1e-5);

        let result = InferenceEngine::new()
            .infer(&model, &ScaledFeatureVector(vec![1.0, 0.0, 2.0]))
            .unwrap();
        assert_eq!(result.label, AttritionLabel::WillLeave);
    }

    #[test]
    fn test_onnx_explicit_output_selection() {
        let logits = onnx("softmax_3.onnx", Some(0));
        let [first, second] = logits.predict_proba(&[3.0, 0.0, 0.0]).unwrap();
        assert_eq!(first, 0.0);
        assert!((second - 3.0).abs() < 1e-5);

        let engine = InferenceEngine::new();
        let err = engine
            .infer(&logits, &ScaledFeatureVector(vec![3.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Inference(_)));

        let missing = onnx("softmax_3.onnx", Some(5));
        let err = missing.predict_proba(&[0.0, 0.0, 0.0]).unwrap_err();
        assert!(err.to_string().contains("no output #5"));
    }

    #[test]
    fn test_onnx_artifact_resolves_relative_model_path() {
        let json = r#"{
            "kind": "onnx",
            "feature_names_in": ["Age", "MonthlyIncome", "OverTime"],
            "model_path": "sigmoid_3.onnx",
            "threshold": 0.3,
            "version": "onnx-1"
        }"#;
        let artifact: ClassifierArtifact = serde_json::from_str(json).unwrap();
        let base_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
        let classifier = artifact.into_classifier(&base_dir).unwrap();

        assert_eq!(classifier.kind(), "onnx");
        assert_eq!(classifier.version(), "onnx-1");
        // sigmoid(-0.5) ~= 0.38 clears the 0.3 threshold
        assert_eq!(
            classifier.predict(&[0.0, 0.5, 0.0]).unwrap(),
            AttritionLabel::WillLeave
        );
    }
}
