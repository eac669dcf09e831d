//! Feature schema inspection command

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use super::Source;
use crate::client::SchemaInfo;
use crate::output::{print_table, OutputFormat};

/// Row for the feature column table
#[derive(Tabled, Serialize)]
struct ColumnRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Column")]
    column: String,
    #[tabled(rename = "Source")]
    source: String,
}

/// Row for the one-hot layout table
#[derive(Tabled, Serialize)]
struct FamilyRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Columns")]
    columns: usize,
    #[tabled(rename = "Baseline")]
    baseline: String,
}

fn column_rows(schema: &SchemaInfo) -> Vec<ColumnRow> {
    schema
        .features
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let source = schema
                .layout
                .families
                .iter()
                .find_map(|f| {
                    f.columns
                        .iter()
                        .find(|(_, c)| c == column)
                        .map(|(value, _)| format!("{} = {}", f.field, value))
                })
                .unwrap_or_else(|| "direct".to_string());
            ColumnRow {
                index,
                column: column.clone(),
                source,
            }
        })
        .collect()
}

fn family_rows(schema: &SchemaInfo) -> Vec<FamilyRow> {
    schema
        .layout
        .families
        .iter()
        .map(|f| FamilyRow {
            field: f.field.clone(),
            columns: f.columns.len(),
            baseline: f.baseline.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect()
}

/// Show the feature columns and one-hot layout the classifier expects
pub async fn show_schema(source: &Source, format: OutputFormat) -> Result<()> {
    let schema = match source {
        Source::Remote(client) => client.schema().await?,
        Source::Local(pipeline) => SchemaInfo::from_artifacts(&*pipeline.warm()?),
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&schema)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Feature Schema".bold());
            println!("{}", "=".repeat(60));
            println!("Classifier: {}", schema.classifier.cyan());
            println!("Version:    {}", schema.version.cyan());
            println!("Threshold:  {}", schema.threshold);
            println!();

            print_table(&column_rows(&schema), format);
            println!();
            println!("{}", "One-hot layout".bold());
            print_table(&family_rows(&schema), format);
            println!("\nTotal: {} features", schema.features.len());
        }
    }

    Ok(())
}
