//! Vendex Core Library
//!
//! Vendor extraction for bank transaction exports:
//! - CSV import of transaction rows
//! - Pluggable classifier backends (OpenAI-compatible, Ollama, mock)
//! - Prompt library for the vendor extraction prompt
//! - Vendor resolver with a per-run cache
//! - Batch upload to a PostgREST-style store with embedding generation
//! - Layered configuration (defaults, TOML file, environment, CLI)

pub mod ai;
pub mod config;
pub mod enrich;
pub mod error;
pub mod import;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod resolver;
pub mod store;
pub mod upload;

/// Test utilities including mock classifier and store servers
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIClient, ClassifierBackend, MockBackend, OllamaBackend, OpenAICompatibleBackend};
pub use config::{BackendKind, Config, Overrides};
pub use enrich::{EnrichStats, Enricher};
pub use error::{Error, Result};
pub use models::{Transaction, TransactionRecord, UploadResult, VendorClassification};
pub use pipeline::{Pipeline, PipelineReport};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use resolver::{Resolution, VendorResolver};
pub use store::StoreClient;
pub use upload::Uploader;
