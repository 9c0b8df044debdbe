//! Diabetes Predictor CLI
//!
//! A command-line tool for requesting predictions, inspecting the feature
//! schema, and checking the health of a diabetes predictor server.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, predict, schema};
use std::path::PathBuf;

/// Diabetes Predictor CLI
#[derive(Parser)]
#[command(name = "dpc")]
#[command(author, version, about = "CLI for the Diabetes Predictor", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via DPC_API_URL env var)
    #[arg(long, env = "DPC_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Request a prediction for one record
    Predict {
        /// JSON file holding the record
        #[arg(long, short = 'F')]
        file: Option<PathBuf>,

        /// Start from a built-in sample record
        #[arg(long, conflicts_with = "file")]
        sample: bool,

        /// Set or override a field (NAME=VALUE), repeatable
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
    },

    /// Show server health and readiness
    Health,

    /// Show the expected feature fields
    Schema {
        /// Print the built-in schema without contacting the server
        #[arg(long)]
        local: bool,
    },

    /// Validate a record file offline
    Validate {
        /// JSON file holding one record or an array of records
        #[arg(long, short = 'F')]
        file: PathBuf,

        /// Reject numeric strings
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    let format = cli
        .format
        .or(config.default_format)
        .unwrap_or_default();

    // Only commands that talk to the server need a client
    let api_url = config.api_url(cli.api_url);
    let connect = || client::ApiClient::new(&api_url);

    // Execute command
    match cli.command {
        Commands::Predict { file, sample, set } => {
            predict::predict(&connect()?, file.as_deref(), sample, &set, format).await?;
        }
        Commands::Health => {
            health::show_health(&connect()?, format).await?;
        }
        Commands::Schema { local: true } => {
            schema::show_local_schema(format);
        }
        Commands::Schema { local: false } => {
            schema::show_schema(&connect()?, format).await?;
        }
        Commands::Validate { file, strict } => {
            schema::validate_file(&file, strict, format)?;
        }
    }

    Ok(())
}
