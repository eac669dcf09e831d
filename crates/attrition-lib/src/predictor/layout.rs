//! One-hot layout reconstruction from a deployed feature schema
//!
//! The baseline category of each one-hot family is never stored with the
//! artifacts; it is the one value the training run did not give a column.
//! This module recovers it from the schema and rejects schemas that cannot
//! have come from the closed value sets the encoder knows about.

use super::features::{direct_columns, one_hot_column, OneHotFamily};
use crate::error::{PipelineError, Result};
use crate::models::FeatureSchema;
use serde::Serialize;

/// Column assignment for one one-hot family
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyLayout {
    pub field: &'static str,
    /// Values that own a column, with the column name
    pub columns: Vec<(&'static str, String)>,
    /// Value absorbed into the intercept, if the closed set has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<&'static str>,
}

/// One-hot layout of every categorical family in a schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryLayout {
    pub families: Vec<FamilyLayout>,
}

impl CategoryLayout {
    /// Reconstruct the layout, failing with `SchemaMismatch` when the schema
    /// lacks a direct column, names an unknown category, or leaves more than
    /// one value of a family without a column.
    pub fn resolve(schema: &FeatureSchema) -> Result<Self> {
        let missing: Vec<&str> = direct_columns()
            .into_iter()
            .filter(|c| !schema.contains(c))
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::schema(format!(
                "schema is missing required columns [{}]",
                missing.join(", ")
            )));
        }

        let families = OneHotFamily::ALL
            .iter()
            .map(|family| resolve_family(*family, schema))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { families })
    }

    pub fn family(&self, field: &str) -> Option<&FamilyLayout> {
        self.families.iter().find(|f| f.field == field)
    }
}

fn resolve_family(family: OneHotFamily, schema: &FeatureSchema) -> Result<FamilyLayout> {
    let field = family.field();
    let values = family.values();
    let prefix = family.column_prefix();

    for name in schema.iter().filter(|n| n.starts_with(&prefix)) {
        let suffix = &name[prefix.len()..];
        if !values.iter().any(|v| *v == suffix) {
            return Err(PipelineError::schema(format!(
                "column {:?} does not match any {} value",
                name, field
            )));
        }
    }

    let mut columns = Vec::new();
    let mut uncovered = Vec::new();
    for value in values {
        let column = one_hot_column(field, value);
        if schema.contains(&column) {
            columns.push((value, column));
        } else {
            uncovered.push(value);
        }
    }

    if uncovered.len() > 1 {
        return Err(PipelineError::schema(format!(
            "{} has no column for [{}]; at most one baseline value is allowed",
            field,
            uncovered.join(", ")
        )));
    }

    Ok(FamilyLayout {
        field,
        columns,
        baseline: uncovered.first().copied(),
    })
}
