//! CLI command implementations
//!
//! - `extract` - Classify vendors in a CSV file and upload the results
//! - `prompts` - Prompt library commands

pub mod extract;
pub mod prompts;

// Re-export command functions for main.rs
pub use extract::*;
pub use prompts::*;
