//! End-to-end extraction run
//!
//! read CSV -> fetch known vendors -> enrich -> upload -> trigger embeddings
//!
//! Only an unreadable CSV aborts the run. Everything downstream degrades:
//! the vendor list falls back to empty, classifier errors fall back per
//! description, and batch errors are reported in the upload result.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::ai::{AIClient, ClassifierBackend};
use crate::config::Config;
use crate::enrich::{EnrichStats, Enricher};
use crate::error::Result;
use crate::import::read_transactions;
use crate::models::{Transaction, UploadResult};
use crate::resolver::VendorResolver;
use crate::store::StoreClient;
use crate::upload::Uploader;

/// Summary of one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub rows_read: usize,
    pub known_vendors: usize,
    pub enrich: EnrichStats,
    /// Absent on dry runs
    pub upload: Option<UploadResult>,
    /// Enriched transactions, in input order
    #[serde(skip)]
    pub transactions: Vec<Transaction>,
}

pub struct Pipeline<B: ClassifierBackend> {
    enricher: Enricher<B>,
    store: StoreClient,
    uploader: Uploader,
}

impl Pipeline<AIClient> {
    /// Build the classifier and store clients described by `config`
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            AIClient::from_config(&config.classifier),
            StoreClient::from_config(&config.store),
            config,
        )
    }
}

impl<B: ClassifierBackend> Pipeline<B> {
    pub fn new(backend: B, store: StoreClient, config: &Config) -> Self {
        let resolver =
            VendorResolver::new(backend).with_max_hints(config.pipeline.max_vendor_hints);
        let enricher = Enricher::new(resolver).with_throttle(config.pipeline.throttle());
        let uploader = Uploader::new(store.clone())
            .with_batch_size(config.pipeline.batch_size)
            .with_embeddings_limit(config.pipeline.embeddings_limit)
            .with_dedupe(config.pipeline.dedupe);

        Self {
            enricher,
            store,
            uploader,
        }
    }

    pub fn enricher(&self) -> &Enricher<B> {
        &self.enricher
    }

    /// Run the full pipeline for one CSV file
    ///
    /// With `dry_run`, stops after enrichment: nothing is written to the
    /// store and no embeddings are requested.
    pub async fn run(&mut self, path: &Path, dry_run: bool) -> Result<PipelineReport> {
        let mut transactions = read_transactions(path)?;
        info!("Read {} transactions from {}", transactions.len(), path.display());

        let known_vendors = self.known_vendors().await;

        let enrich = self.enricher.enrich(&mut transactions, &known_vendors).await;

        let upload = if dry_run {
            info!("Dry run, skipping upload");
            None
        } else {
            Some(self.uploader.upload(&transactions).await)
        };

        Ok(PipelineReport {
            rows_read: transactions.len(),
            known_vendors: known_vendors.len(),
            enrich,
            upload,
            transactions,
        })
    }

    /// Fetch the store's vendor list once per run, degrading to empty
    async fn known_vendors(&self) -> Vec<String> {
        match self.store.fetch_vendor_names().await {
            Ok(vendors) => {
                info!("Found {} known vendors", vendors.len());
                vendors
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch known vendors, continuing without hints");
                Vec::new()
            }
        }
    }
}
