//! CLI argument definitions using clap
//!
//! This module contains the clap structs for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vendex_core::config::{BackendKind, Overrides};

/// Vendex - Extract vendors from bank transaction exports
#[derive(Parser)]
#[command(name = "vendex")]
#[command(about = "Classify bank transaction vendors and upload them to the store", long_about = None)]
#[command(version)]
#[command(subcommand_negates_reqs = true)]
pub struct Cli {
    /// CSV file of transactions to process
    #[arg(required = true)]
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub extract: ExtractArgs,

    /// Config file (defaults to ~/.local/share/vendex/config.toml)
    #[arg(long, env = "VENDEX_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Flags for an extraction run
///
/// Unset flags fall back to environment variables, then the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ExtractArgs {
    /// Classifier backend: openai, ollama, mock
    #[arg(long)]
    pub backend: Option<BackendKind>,

    /// OpenAI API key
    #[arg(long)]
    pub api_key: Option<String>,

    /// Store base URL
    #[arg(long)]
    pub supabase_url: Option<String>,

    /// Store service key
    #[arg(long)]
    pub supabase_key: Option<String>,

    /// Classifier model name
    #[arg(long)]
    pub model: Option<String>,

    /// Records per upload batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Delay between classifier calls in milliseconds (0 disables)
    #[arg(long)]
    pub throttle_ms: Option<u64>,

    /// Maximum records to embed after upload
    #[arg(long)]
    pub embeddings_limit: Option<usize>,

    /// Tag rows with an import hash so re-running a file skips existing rows
    #[arg(long)]
    pub dedupe: bool,

    /// Enrich and print transactions as JSON without uploading
    #[arg(long)]
    pub dry_run: bool,
}

impl ExtractArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            backend: self.backend,
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            store_url: self.supabase_url.clone(),
            store_key: self.supabase_key.clone(),
            batch_size: self.batch_size,
            throttle_ms: self.throttle_ms,
            embeddings_limit: self.embeddings_limit,
            dedupe: self.dedupe,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the vendor extraction prompt
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// Show the active prompt (override or embedded default)
    Show {
        /// Prompt ID
        #[arg(default_value = "extract_vendor")]
        id: String,
    },
    /// Show the directory prompt overrides are read from
    Path,
}
