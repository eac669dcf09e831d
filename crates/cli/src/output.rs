//! Output formatting utilities

use attrition_lib::PredictionResult;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a probability as percentage
pub fn format_probability(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

/// Color the probability of leaving by verdict
pub fn color_leave_probability(result: &PredictionResult) -> String {
    let formatted = format_probability(result.probability);
    if result.will_leave() {
        formatted.red().to_string()
    } else if result.probability >= 0.3 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

/// One-line verdict for a prediction
pub fn verdict(result: &PredictionResult) -> String {
    if result.will_leave() {
        format!(
            "The employee is likely to leave (probability {})",
            format_probability(result.probability)
        )
    } else {
        format!(
            "The employee is likely to stay (probability {})",
            format_probability(result.stay_probability())
        )
    }
}

/// Retention suggestion for a prediction
pub fn suggestion(result: &PredictionResult) -> &'static str {
    if result.will_leave() {
        "Review compensation, job satisfaction, and work–life balance"
    } else {
        "Maintain the positive work environment"
    }
}
