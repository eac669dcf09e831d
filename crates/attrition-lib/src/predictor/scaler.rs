//! Fitted feature scaler and the adapter that replays it at inference time

use crate::error::{PipelineError, Result};
use crate::models::{EncodedFeatureVector, FeatureSchema, ScaledFeatureVector};
use serde::{Deserialize, Serialize};

/// Per-column parameters of a fitted scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerParams {
    /// (x - mean) / scale
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// x * scale + min
    MinMax { min: Vec<f64>, scale: Vec<f64> },
    /// (x - center) / scale
    Robust { center: Vec<f64>, scale: Vec<f64> },
    /// x / max_abs
    MaxAbs { max_abs: Vec<f64> },
}

impl ScalerParams {
    pub fn kind(&self) -> &'static str {
        match self {
            ScalerParams::Standard { .. } => "standard",
            ScalerParams::MinMax { .. } => "min_max",
            ScalerParams::Robust { .. } => "robust",
            ScalerParams::MaxAbs { .. } => "max_abs",
        }
    }

    fn columns(&self) -> usize {
        match self {
            ScalerParams::Standard { mean, .. } => mean.len(),
            ScalerParams::MinMax { min, .. } => min.len(),
            ScalerParams::Robust { center, .. } => center.len(),
            ScalerParams::MaxAbs { max_abs } => max_abs.len(),
        }
    }

    fn apply(&self, i: usize, x: f64) -> f64 {
        match self {
            ScalerParams::Standard { mean, scale } => (x - mean[i]) / scale[i],
            ScalerParams::MinMax { min, scale } => x * scale[i] + min[i],
            ScalerParams::Robust { center, scale } => (x - center[i]) / scale[i],
            ScalerParams::MaxAbs { max_abs } => x / max_abs[i],
        }
    }
}

/// Scaler artifact as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    #[serde(flatten)]
    pub params: ScalerParams,
    /// Column names seen at fit time, when the scaler was fit on named data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names_in: Option<Vec<String>>,
}

impl FittedScaler {
    /// Number of columns the scaler was fit on
    pub fn n_features(&self) -> usize {
        self.params.columns()
    }

    /// Reject parameters that could only produce garbage output
    pub fn validate(&self) -> Result<()> {
        let n = self.n_features();
        if n == 0 {
            return Err(PipelineError::artifact("scaler has no columns"));
        }

        let (offsets, divisors): (&[f64], &[f64]) = match &self.params {
            ScalerParams::Standard { mean, scale } => (mean.as_slice(), scale.as_slice()),
            ScalerParams::Robust { center, scale } => (center.as_slice(), scale.as_slice()),
            ScalerParams::MinMax { min, scale } => (min.as_slice(), scale.as_slice()),
            ScalerParams::MaxAbs { max_abs } => (max_abs.as_slice(), max_abs.as_slice()),
        };
        if divisors.len() != n {
            return Err(PipelineError::artifact(format!(
                "{} scaler parameter lengths differ ({} vs {})",
                self.params.kind(),
                n,
                divisors.len()
            )));
        }
        if offsets.iter().chain(divisors).any(|v| !v.is_finite()) {
            return Err(PipelineError::artifact(format!(
                "{} scaler has non-finite parameters",
                self.params.kind()
            )));
        }
        let divides = !matches!(self.params, ScalerParams::MinMax { .. });
        if divides {
            if let Some(i) = divisors.iter().position(|d| *d == 0.0) {
                return Err(PipelineError::artifact(format!(
                    "{} scaler has zero scale at column {}",
                    self.params.kind(),
                    i
                )));
            }
        }

        if let Some(names) = &self.feature_names_in {
            if names.len() != n {
                return Err(PipelineError::artifact(format!(
                    "scaler lists {} feature names for {} columns",
                    names.len(),
                    n
                )));
            }
        }
        Ok(())
    }
}

/// Replays a fitted scaler against schema-aligned vectors
#[derive(Debug, Clone)]
pub struct ScalerAdapter {
    scaler: FittedScaler,
}

impl ScalerAdapter {
    /// Bind a scaler to the classifier schema.
    ///
    /// Fails with `SchemaMismatch` when the scaler was fit on named columns
    /// whose count or order differs from the classifier's.
    pub fn new(scaler: FittedScaler, schema: &FeatureSchema) -> Result<Self> {
        if let Some(reason) = scaler
            .feature_names_in
            .as_deref()
            .and_then(|names| order_mismatch(names, schema.names()))
        {
            return Err(PipelineError::schema(reason));
        }
        if scaler.n_features() != schema.len() {
            return Err(PipelineError::schema(format!(
                "scaler was fit on {} columns, classifier expects {}",
                scaler.n_features(),
                schema.len()
            )));
        }
        Ok(Self { scaler })
    }

    pub fn scaler(&self) -> &FittedScaler {
        &self.scaler
    }

    pub fn transform(&self, encoded: &EncodedFeatureVector) -> Result<ScaledFeatureVector> {
        let expected = self.scaler.n_features();
        if encoded.len() != expected {
            return Err(PipelineError::schema(format!(
                "scaler expects {} features, got {}",
                expected,
                encoded.len()
            )));
        }
        if let Some(i) = encoded.values().iter().position(|v| !v.is_finite()) {
            return Err(PipelineError::Transform(format!(
                "input column {} is not a finite number",
                i
            )));
        }

        let scaled: Vec<f64> = encoded
            .values()
            .iter()
            .enumerate()
            .map(|(i, x)| self.scaler.params.apply(i, *x))
            .collect();

        if let Some(i) = scaled.iter().position(|v| !v.is_finite()) {
            return Err(PipelineError::Transform(format!(
                "scaled column {} overflowed to a non-finite value",
                i
            )));
        }

        Ok(ScaledFeatureVector(scaled))
    }
}

fn order_mismatch(fitted: &[String], schema: &[String]) -> Option<String> {
    if fitted.len() != schema.len() {
        return Some(format!(
            "scaler was fit on {} columns, classifier expects {}",
            fitted.len(),
            schema.len()
        ));
    }
    fitted
        .iter()
        .zip(schema)
        .position(|(a, b)| a != b)
        .map(|i| {
            format!(
                "column {} is {:?} for the scaler but {:?} for the classifier",
                i, fitted[i], schema[i]
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec!["Age".into(), "MonthlyIncome".into(), "OverTime".into()])
    }

    fn standard() -> FittedScaler {
        FittedScaler {
            params: ScalerParams::Standard {
                mean: vec![36.0, 6500.0, 0.3],
                scale: vec![9.0, 4700.0, 0.45],
            },
            feature_names_in: Some(schema().names().to_vec()),
        }
    }

    #[test]
    fn test_standard_transform() {
        let adapter = ScalerAdapter::new(standard(), &schema()).unwrap();
        let out = adapter
            .transform(&EncodedFeatureVector(vec![45.0, 6500.0, 0.3]))
            .unwrap();
        assert!((out.values()[0] - 1.0).abs() < 1e-12);
        assert!(out.values()[1].abs() < 1e-12);
        assert!(out.values()[2].abs() < 1e-12);
    }

    #[test]
    fn test_min_max_and_max_abs() {
        let min_max = FittedScaler {
            params: ScalerParams::MinMax {
                min: vec![-0.5],
                scale: vec![0.5],
            },
            feature_names_in: None,
        };
        let one = FeatureSchema::new(vec!["Age".into()]);
        let out = ScalerAdapter::new(min_max, &one)
            .unwrap()
            .transform(&EncodedFeatureVector(vec![3.0]))
            .unwrap();
        assert_eq!(out.values(), &[1.0]);

        let max_abs = FittedScaler {
            params: ScalerParams::MaxAbs { max_abs: vec![4.0] },
            feature_names_in: None,
        };
        let out = ScalerAdapter::new(max_abs, &one)
            .unwrap()
            .transform(&EncodedFeatureVector(vec![-2.0]))
            .unwrap();
        assert_eq!(out.values(), &[-0.5]);
    }

    #[test]
    fn test_column_count_mismatch() {
        let adapter = ScalerAdapter::new(standard(), &schema()).unwrap();
        let err = adapter
            .transform(&EncodedFeatureVector(vec![45.0, 6500.0]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch(_)));
    }

    #[test]
    fn test_column_order_mismatch_rejected_on_bind() {
        let reordered =
            FeatureSchema::new(vec!["MonthlyIncome".into(), "Age".into(), "OverTime".into()]);
        let err = ScalerAdapter::new(standard(), &reordered).unwrap_err();
        assert_eq!(err.kind(), "schema_mismatch");
        assert!(err.to_string().contains("MonthlyIncome"));
    }

    #[test]
    fn test_unnamed_scaler_width_checked_on_bind() {
        let unnamed = FittedScaler {
            feature_names_in: None,
            ..standard()
        };
        let wider = FeatureSchema::new(vec![
            "Age".into(),
            "MonthlyIncome".into(),
            "OverTime".into(),
            "Gender".into(),
        ]);
        let err = ScalerAdapter::new(unnamed, &wider).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch(_)));
    }

    #[test]
    fn test_non_finite_input_is_transform_error() {
        let adapter = ScalerAdapter::new(standard(), &schema()).unwrap();
        let err = adapter
            .transform(&EncodedFeatureVector(vec![f64::NAN, 6500.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transform(_)));
    }

    #[test]
    fn test_validate_rejects_zero_scale() {
        let mut scaler = standard();
        scaler.params = ScalerParams::Standard {
            mean: vec![0.0, 0.0, 0.0],
            scale: vec![1.0, 0.0, 1.0],
        };
        assert!(scaler.validate().unwrap_err().is_fatal());
    }

    #[test]
    fn test_validate_rejects_ragged_parameters() {
        let scaler = FittedScaler {
            params: ScalerParams::Robust {
                center: vec![0.0, 1.0],
                scale: vec![1.0],
            },
            feature_names_in: None,
        };
        assert!(scaler.validate().is_err());
    }

    #[test]
    fn test_deserialize_artifact_json() {
        let json = r#"{"kind":"standard","mean":[1.0],"scale":[2.0],"feature_names_in":["Age"]}"#;
        let scaler: FittedScaler = serde_json::from_str(json).unwrap();
        assert_eq!(scaler.params.kind(), "standard");
        assert_eq!(scaler.n_features(), 1);
        assert!(scaler.validate().is_ok());
    }
}
