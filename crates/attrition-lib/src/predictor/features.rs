//! Feature encoding for ML inference
//!
//! Expands a [`RawInputRecord`] into the dense, schema-ordered vector the
//! classifier was trained on. Numeric fields are copied verbatim, binary
//! categoricals use the fixed tables below, and multi-valued categoricals are
//! one-hot encoded into `<FieldName>_<Value>` columns.
//!
//! Any column the schema does not carry is left at zero. For one-hot families
//! this represents the implicit baseline category. Shape problems are
//! reported by the scaler adapter and by [`CategoryLayout`](super::CategoryLayout).

use crate::models::{
    BusinessTravel, EducationField, EncodedFeatureVector, FeatureSchema, Gender, JobRole,
    MaritalStatus, OverTime, RawInputRecord,
};
use serde::Serialize;
use std::collections::HashMap;

/// Training-time encoding of `Gender`
pub const GENDER_ENCODING: [(Gender, f64); 2] = [(Gender::Male, 0.0), (Gender::Female, 1.0)];

/// Training-time encoding of `OverTime`
pub const OVERTIME_ENCODING: [(OverTime, f64); 2] = [(OverTime::No, 0.0), (OverTime::Yes, 1.0)];

/// Categorical fields expanded into one-hot indicator columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OneHotFamily {
    JobRole,
    EducationField,
    BusinessTravel,
    MaritalStatus,
}

impl OneHotFamily {
    pub const ALL: [OneHotFamily; 4] = [
        OneHotFamily::JobRole,
        OneHotFamily::EducationField,
        OneHotFamily::BusinessTravel,
        OneHotFamily::MaritalStatus,
    ];

    /// Input field name, also the one-hot column prefix
    pub fn field(&self) -> &'static str {
        match self {
            OneHotFamily::JobRole => JobRole::FIELD,
            OneHotFamily::EducationField => EducationField::FIELD,
            OneHotFamily::BusinessTravel => BusinessTravel::FIELD,
            OneHotFamily::MaritalStatus => MaritalStatus::FIELD,
        }
    }

    /// Closed value set of the field
    pub fn values(&self) -> Vec<&'static str> {
        match self {
            OneHotFamily::JobRole => JobRole::ALL.iter().map(|v| v.as_str()).collect(),
            OneHotFamily::EducationField => {
                EducationField::ALL.iter().map(|v| v.as_str()).collect()
            }
            OneHotFamily::BusinessTravel => {
                BusinessTravel::ALL.iter().map(|v| v.as_str()).collect()
            }
            OneHotFamily::MaritalStatus => MaritalStatus::ALL.iter().map(|v| v.as_str()).collect(),
        }
    }

    /// Value of this field selected in a record
    pub fn selected(&self, record: &RawInputRecord) -> &'static str {
        match self {
            OneHotFamily::JobRole => record.job_role.as_str(),
            OneHotFamily::EducationField => record.education_field.as_str(),
            OneHotFamily::BusinessTravel => record.business_travel.as_str(),
            OneHotFamily::MaritalStatus => record.marital_status.as_str(),
        }
    }

    /// Prefix shared by every column of this family
    pub fn column_prefix(&self) -> String {
        format!("{}_", self.field())
    }
}

/// One-hot column name for a categorical value
pub fn one_hot_column(field: &str, value: &str) -> String {
    format!("{}_{}", field, value)
}

/// Columns assigned directly from the record, numeric fields first
pub fn direct_columns() -> [&'static str; 8] {
    [
        "Age",
        "MonthlyIncome",
        "JobSatisfaction",
        "EnvironmentSatisfaction",
        "YearsAtCompany",
        "WorkLifeBalance",
        Gender::FIELD,
        OverTime::FIELD,
    ]
}

pub fn encode_gender(gender: Gender) -> f64 {
    lookup(&GENDER_ENCODING, gender)
}

pub fn encode_over_time(over_time: OverTime) -> f64 {
    lookup(&OVERTIME_ENCODING, over_time)
}

fn lookup<T: PartialEq + Copy>(table: &[(T, f64)], key: T) -> f64 {
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .unwrap_or(0.0)
}

/// Encodes raw records into schema-aligned feature vectors
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    width: usize,
    positions: HashMap<String, usize>,
}

impl FeatureEncoder {
    pub fn new(schema: &FeatureSchema) -> Self {
        let positions = schema
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        Self {
            width: schema.len(),
            positions,
        }
    }

    /// Number of columns every encoded vector has
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn encode(&self, record: &RawInputRecord) -> EncodedFeatureVector {
        let mut vector = EncodedFeatureVector::zeros(self.width);

        for (column, value) in record.numeric_fields() {
            self.set(&mut vector, column, value);
        }

        self.set(&mut vector, Gender::FIELD, encode_gender(record.gender));
        self.set(&mut vector, OverTime::FIELD, encode_over_time(record.over_time));

        for family in OneHotFamily::ALL {
            let column = one_hot_column(family.field(), family.selected(record));
            self.set(&mut vector, &column, 1.0);
        }

        vector
    }

    fn set(&self, vector: &mut EncodedFeatureVector, column: &str, value: f64) {
        if let Some(&idx) = self.positions.get(column) {
            vector.0[idx] = value;
        }
    }
}
