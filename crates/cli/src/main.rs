//! Employee Attrition Predictor CLI
//!
//! A command-line tool for predicting attrition and inspecting the
//! feature schema, either through a running agent or local artifacts.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{predict, schema, Source, SourceArgs};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Employee Attrition Predictor CLI
#[derive(Parser)]
#[command(name = "attr")]
#[command(author, version, about = "CLI for the Employee Attrition Predictor", long_about = None)]
pub struct Cli {
    /// Agent URL (can also be set via ATTR_API_URL env var)
    #[arg(long, env = "ATTR_API_URL")]
    pub api_url: Option<String>,

    /// Scaler artifact; predict locally instead of calling an agent
    #[arg(long)]
    pub scaler: Option<PathBuf>,

    /// Classifier artifact; predict locally instead of calling an agent
    #[arg(long)]
    pub classifier: Option<PathBuf>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict whether an employee is likely to leave
    Predict(predict::PredictArgs),

    /// Show the feature columns and one-hot layout
    Schema,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::Config::load()?;
    let format = match (cli.format, config.default_format.as_deref()) {
        (Some(format), _) => format,
        (None, Some(name)) => output::OutputFormat::from_str(name, true)
            .map_err(|e| anyhow::anyhow!("Invalid default_format in config: {}", e))?,
        (None, None) => output::OutputFormat::default(),
    };

    let source_args = SourceArgs {
        api_url: cli.api_url,
        scaler: cli.scaler,
        classifier: cli.classifier,
    };
    let source = Source::resolve(&source_args, &config)?;
    tracing::debug!(local = source.is_local(), "Prediction source resolved");

    let outcome = match cli.command {
        Commands::Predict(args) => predict::predict(&source, args, format).await,
        Commands::Schema => schema::show_schema(&source, format).await,
    };

    if let Err(e) = outcome {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
