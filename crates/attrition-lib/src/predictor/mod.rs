//! Feature encoding and inference pipeline

mod features;
mod inference;
mod layout;
mod scaler;

pub use features::{
    direct_columns, encode_gender, encode_over_time, one_hot_column, FeatureEncoder,
    OneHotFamily, GENDER_ENCODING, OVERTIME_ENCODING,
};
pub use inference::{
    ClassifierArtifact, InferenceEngine, InferenceStats, LogisticRegression, OnnxClassifier,
    DEFAULT_THRESHOLD,
};
pub use layout::{CategoryLayout, FamilyLayout};
pub use scaler::{FittedScaler, ScalerAdapter, ScalerParams};

use crate::error::Result;
use crate::models::AttritionLabel;

/// Trait for fitted binary classifiers
pub trait BinaryClassifier: Send + Sync {
    /// Ordered feature names the classifier was fit on
    fn feature_names(&self) -> &[String];

    /// Decision threshold on P(WillLeave)
    fn threshold(&self) -> f64;

    /// Class probabilities `[P(WillStay), P(WillLeave)]` for one scaled row
    fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2]>;

    /// Discrete label for one scaled row
    fn predict(&self, features: &[f64]) -> Result<AttritionLabel> {
        let [_, leave] = self.predict_proba(features)?;
        Ok(AttritionLabel::from_probability(leave, self.threshold()))
    }

    /// Short name of the model family, for logs and metrics
    fn kind(&self) -> &'static str;

    /// Version string carried by the artifact
    fn version(&self) -> &str;
}
