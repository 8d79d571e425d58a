//! Vendex CLI - Transaction vendor extractor
//!
//! Usage:
//!   vendex transactions.csv            Classify vendors and upload
//!   vendex transactions.csv --dry-run  Classify and print JSON only
//!   vendex prompts show                Show the extraction prompt
//!   vendex prompts path                Show the prompt override directory

mod cli;
mod commands;


use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Some(Commands::Prompts { action }) => match action {
            PromptsAction::Show { id } => commands::cmd_prompts_show(&id),
            PromptsAction::Path => commands::cmd_prompts_path(),
        },
        None => {
            let file = cli.file.context("CSV file argument is required")?;
            commands::cmd_extract(&file, cli.config.as_deref(), &cli.extract)
                .await
                .map(|_| ())
        }
    }
}
