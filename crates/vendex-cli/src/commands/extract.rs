//! Extraction command implementation

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use vendex_core::{ClassifierBackend, Config, Pipeline, PipelineReport};

use crate::cli::ExtractArgs;

/// Resolve configuration for a run: file, then environment, then flags
pub fn load_config(config_path: Option<&Path>, args: &ExtractArgs) -> Result<Config> {
    let mut config = Config::load(config_path).context("Failed to load configuration")?;
    config
        .apply_overrides(args.overrides())
        .context("Invalid configuration")?;
    debug!(
        backend = ?config.classifier.backend,
        batch_size = config.pipeline.batch_size,
        throttle_ms = config.pipeline.throttle_ms,
        dedupe = config.pipeline.dedupe,
        "Configuration loaded"
    );
    Ok(config)
}

pub async fn cmd_extract(
    file: &Path,
    config_path: Option<&Path>,
    args: &ExtractArgs,
) -> Result<PipelineReport> {
    let config = load_config(config_path, args)?;
    let mut pipeline = Pipeline::from_config(&config);
    let backend = pipeline.enricher().resolver().backend();

    println!("📥 Processing {}...", file.display());
    println!("   Classifier: {} @ {}", backend.model(), backend.host());
    if !args.dry_run {
        println!("   Store: {}", config.store.url);
    }

    let report = pipeline
        .run(file, args.dry_run)
        .await
        .with_context(|| format!("Failed to process {}", file.display()))?;

    println!("   Read {} transactions", report.rows_read);
    println!("   Found {} known vendors", report.known_vendors);

    println!();
    println!("🏷️  Vendor extraction ({} rows):", report.enrich.total());
    println!("   Classified: {}", report.enrich.classified);
    if report.enrich.cached > 0 {
        println!("   From cache: {}", report.enrich.cached);
    }
    if report.enrich.fallback > 0 {
        println!("   Fallback (classifier error): {}", report.enrich.fallback);
    }
    if report.enrich.skipped > 0 {
        println!("   Skipped: {}", report.enrich.skipped);
    }

    match &report.upload {
        None => {
            println!();
            println!("🔍 Dry run, nothing uploaded:");
            println!(
                "{}",
                serde_json::to_string_pretty(&report.transactions)
                    .context("Failed to serialize transactions")?
            );
        }
        Some(upload) => {
            println!();
            if upload.failed == 0 {
                println!("✅ Upload complete!");
            } else {
                println!("⚠️  Upload finished with errors");
            }
            println!("   Uploaded: {}", upload.success);
            println!("   Failed: {}", upload.failed);
            for error in &upload.errors {
                println!("   - {}", error);
            }
        }
    }

    Ok(report)
}
