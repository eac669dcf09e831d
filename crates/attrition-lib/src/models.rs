//! Core data models for the attrition predictor

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a closed categorical value set.
///
/// The string for each variant is the exact value the artifacts were trained
/// on; it is used for serde, `FromStr`, `Display` and one-hot column names.
macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            /// Input field name this value set belongs to
            pub const FIELD: &'static str = $field;

            /// Every value of the set, in form order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Training-time string for this value
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = PipelineError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($value => Ok($name::$variant),)+
                    other => Err(PipelineError::InvalidInput(format!(
                        "{} must be one of [{}], got {:?}",
                        $field,
                        [$($value),+].join(", "),
                        other
                    ))),
                }
            }
        }
    };
}

closed_set! {
    /// Employee gender
    Gender, "Gender" {
        Male => "Male",
        Female => "Female",
    }
}

closed_set! {
    /// Whether the employee works overtime
    OverTime, "OverTime" {
        No => "No",
        Yes => "Yes",
    }
}

closed_set! {
    /// Job role
    JobRole, "JobRole" {
        HumanResources => "Human Resources",
        LaboratoryTechnician => "Laboratory Technician",
        Manager => "Manager",
        ManufacturingDirector => "Manufacturing Director",
        ResearchDirector => "Research Director",
        ResearchScientist => "Research Scientist",
        SalesExecutive => "Sales Executive",
        SalesRepresentative => "Sales Representative",
    }
}

closed_set! {
    /// Field of education
    EducationField, "EducationField" {
        LifeSciences => "Life Sciences",
        Marketing => "Marketing",
        Medical => "Medical",
        Other => "Other",
        TechnicalDegree => "Technical Degree",
    }
}

closed_set! {
    /// Business travel frequency
    BusinessTravel, "BusinessTravel" {
        NonTravel => "Non-Travel",
        TravelRarely => "Travel_Rarely",
        TravelFrequently => "Travel_Frequently",
    }
}

closed_set! {
    /// Marital status
    MaritalStatus, "MaritalStatus" {
        Divorced => "Divorced",
        Married => "Married",
        Single => "Single",
    }
}

/// Inclusive bounds for the age field
pub const AGE_RANGE: (u32, u32) = (18, 70);

/// Lower bound for monthly income
pub const MIN_MONTHLY_INCOME: u32 = 1000;

/// Inclusive bounds for years at company
pub const YEARS_AT_COMPANY_RANGE: (u32, u32) = (0, 40);

/// Inclusive bounds for the ordinal 1-4 scores
pub const RATING_RANGE: (u32, u32) = (1, 4);

/// Raw, human-entered employee attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawInputRecord {
    pub age: u32,
    pub monthly_income: u32,
    pub job_satisfaction: u32,
    pub environment_satisfaction: u32,
    pub years_at_company: u32,
    pub work_life_balance: u32,
    pub gender: Gender,
    pub over_time: OverTime,
    pub job_role: JobRole,
    pub education_field: EducationField,
    pub business_travel: BusinessTravel,
    pub marital_status: MaritalStatus,
}

impl Default for RawInputRecord {
    fn default() -> Self {
        Self {
            age: 30,
            monthly_income: 5000,
            job_satisfaction: 3,
            environment_satisfaction: 3,
            years_at_company: 5,
            work_life_balance: 3,
            gender: Gender::Male,
            over_time: OverTime::No,
            job_role: JobRole::HumanResources,
            education_field: EducationField::LifeSciences,
            business_travel: BusinessTravel::NonTravel,
            marital_status: MaritalStatus::Divorced,
        }
    }
}

impl RawInputRecord {
    /// Check every numeric field against its declared bounds
    pub fn validate(&self) -> Result<()> {
        check_range("Age", self.age, AGE_RANGE)?;
        if self.monthly_income < MIN_MONTHLY_INCOME {
            return Err(PipelineError::InvalidInput(format!(
                "MonthlyIncome must be at least {}, got {}",
                MIN_MONTHLY_INCOME, self.monthly_income
            )));
        }
        check_range("JobSatisfaction", self.job_satisfaction, RATING_RANGE)?;
        check_range(
            "EnvironmentSatisfaction",
            self.environment_satisfaction,
            RATING_RANGE,
        )?;
        check_range("YearsAtCompany", self.years_at_company, YEARS_AT_COMPANY_RANGE)?;
        check_range("WorkLifeBalance", self.work_life_balance, RATING_RANGE)?;
        Ok(())
    }

    /// Numeric fields paired with the schema column they are copied into
    pub fn numeric_fields(&self) -> [(&'static str, f64); 6] {
        [
            ("Age", self.age as f64),
            ("MonthlyIncome", self.monthly_income as f64),
            ("JobSatisfaction", self.job_satisfaction as f64),
            ("EnvironmentSatisfaction", self.environment_satisfaction as f64),
            ("YearsAtCompany", self.years_at_company as f64),
            ("WorkLifeBalance", self.work_life_balance as f64),
        ]
    }
}

fn check_range(field: &str, value: u32, (min, max): (u32, u32)) -> Result<()> {
    if value < min || value > max {
        return Err(PipelineError::InvalidInput(format!(
            "{} must be between {} and {}, got {}",
            field, min, max, value
        )));
    }
    Ok(())
}

/// Ordered feature names the classifier was trained on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema(Vec<String>);

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Column index of a feature, if the schema has it
    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Dense feature vector in schema order, before scaling
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatureVector(pub Vec<f64>);

impl EncodedFeatureVector {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }
}

/// Feature vector after the fitted scaling transform
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledFeatureVector(pub Vec<f64>);

impl ScaledFeatureVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }
}

/// Predicted attrition outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttritionLabel {
    WillStay,
    WillLeave,
}

impl AttritionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttritionLabel::WillStay => "WillStay",
            AttritionLabel::WillLeave => "WillLeave",
        }
    }

    /// Label implied by a positive-class probability and a decision threshold
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            AttritionLabel::WillLeave
        } else {
            AttritionLabel::WillStay
        }
    }
}

impl fmt::Display for AttritionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: AttritionLabel,
    /// P(WillLeave), in [0, 1]
    pub probability: f64,
}

impl PredictionResult {
    /// Probability that the employee stays
    pub fn stay_probability(&self) -> f64 {
        1.0 - self.probability
    }

    pub fn will_leave(&self) -> bool {
        self.label == AttritionLabel::WillLeave
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_set_parses_training_strings() {
        assert_eq!(
            "Laboratory Technician".parse::<JobRole>().unwrap(),
            JobRole::LaboratoryTechnician
        );
        assert_eq!(
            "Travel_Rarely".parse::<BusinessTravel>().unwrap(),
            BusinessTravel::TravelRarely
        );
        assert_eq!("Non-Travel".parse::<BusinessTravel>().unwrap(), BusinessTravel::NonTravel);
    }

    #[test]
    fn test_closed_set_rejects_unknown_value() {
        let err = "Astronaut".parse::<JobRole>().unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert!(err.to_string().contains("JobRole"));
    }

    #[test]
    fn test_record_serde_uses_request_field_names() {
        let json = serde_json::json!({
            "Age": 30,
            "MonthlyIncome": 5000,
            "JobSatisfaction": 3,
            "EnvironmentSatisfaction": 3,
            "YearsAtCompany": 5,
            "WorkLifeBalance": 3,
            "Gender": "Male",
            "OverTime": "No",
            "JobRole": "Manager",
            "EducationField": "Other",
            "BusinessTravel": "Non-Travel",
            "MaritalStatus": "Single"
        });
        let record: RawInputRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.job_role, JobRole::Manager);
        assert_eq!(record.marital_status, MaritalStatus::Single);
    }

    #[test]
    fn test_record_serde_rejects_unknown_category() {
        let mut json = serde_json::to_value(RawInputRecord::default()).unwrap();
        json["MaritalStatus"] = serde_json::Value::String("Widowed".into());
        assert!(serde_json::from_value::<RawInputRecord>(json).is_err());
    }

    #[test]
    fn test_default_record_is_valid() {
        assert!(RawInputRecord::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bounds() {
        let too_young = RawInputRecord { age: 17, ..Default::default() };
        assert!(matches!(too_young.validate(), Err(PipelineError::InvalidInput(_))));

        let low_income = RawInputRecord { monthly_income: 999, ..Default::default() };
        assert!(low_income.validate().is_err());

        let bad_rating = RawInputRecord { job_satisfaction: 5, ..Default::default() };
        let err = bad_rating.validate().unwrap_err();
        assert!(err.to_string().contains("JobSatisfaction"));

        let tenure = RawInputRecord { years_at_company: 41, ..Default::default() };
        assert!(tenure.validate().is_err());

        let edges = RawInputRecord {
            age: 70,
            years_at_company: 0,
            work_life_balance: 1,
            ..Default::default()
        };
        assert!(edges.validate().is_ok());
    }

    #[test]
    fn test_label_threshold_is_inclusive() {
        assert_eq!(AttritionLabel::from_probability(0.5, 0.5), AttritionLabel::WillLeave);
        assert_eq!(AttritionLabel::from_probability(0.4999, 0.5), AttritionLabel::WillStay);
    }

    #[test]
    fn test_prediction_result_serializes_to_response_shape() {
        let result = PredictionResult {
            label: AttritionLabel::WillStay,
            probability: 0.25,
        };
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["label"], "WillStay");
        assert_eq!(json["probability"], 0.25);
        assert!((result.stay_probability() - 0.75).abs() < 1e-12);
    }
}
