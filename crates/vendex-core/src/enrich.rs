//! Transaction enrichment
//!
//! Fills in vendor, category, type and statement type for each transaction
//! using the vendor resolver. Verified vendors are left alone, and values
//! already present in the source data are never overwritten (except the
//! vendor and confidence score, which always come from the classification).

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::ai::ClassifierBackend;
use crate::models::Transaction;
use crate::resolver::{Resolution, VendorResolver};

/// Progress is logged every this many transactions
const PROGRESS_INTERVAL: usize = 10;

/// What happened to each transaction during enrichment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichStats {
    /// Enriched from a fresh classifier answer
    pub classified: usize,
    /// Enriched from the resolver cache
    pub cached: usize,
    /// Enriched with the fallback classification after a classifier error
    pub fallback: usize,
    /// Left unchanged (no description, or vendor already verified)
    pub skipped: usize,
}

impl EnrichStats {
    /// Transactions accounted for, one outcome each
    pub fn total(&self) -> usize {
        self.classified + self.cached + self.fallback + self.skipped
    }

    fn record(&mut self, resolution: &Resolution) {
        match resolution {
            Resolution::Classified(_) => self.classified += 1,
            Resolution::Cached(_) => self.cached += 1,
            Resolution::Fallback { .. } => self.fallback += 1,
        }
    }
}

pub struct Enricher<B: ClassifierBackend> {
    resolver: VendorResolver<B>,
    throttle: Duration,
}

impl<B: ClassifierBackend> Enricher<B> {
    pub fn new(resolver: VendorResolver<B>) -> Self {
        Self {
            resolver,
            throttle: Duration::ZERO,
        }
    }

    /// Delay observed after every classifier call
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn resolver(&self) -> &VendorResolver<B> {
        &self.resolver
    }

    /// Enrich transactions in place, in order
    pub async fn enrich(
        &mut self,
        transactions: &mut [Transaction],
        known_vendors: &[String],
    ) -> EnrichStats {
        let total = transactions.len();
        let mut stats = EnrichStats::default();

        for (i, tx) in transactions.iter_mut().enumerate() {
            if (i + 1) % PROGRESS_INTERVAL == 0 {
                info!("Enriching transaction {}/{}", i + 1, total);
            }

            let Some(description) = tx.description().map(str::to_string) else {
                stats.skipped += 1;
                continue;
            };
            if tx.has_verified_vendor() {
                debug!("Keeping verified vendor for '{}'", description);
                stats.skipped += 1;
                continue;
            }

            let resolution = self.resolver.resolve(&description, known_vendors).await;
            stats.record(&resolution);
            let reached_classifier = resolution.reached_classifier();
            apply(tx, resolution);

            if reached_classifier && !self.throttle.is_zero() {
                tokio::time::sleep(self.throttle).await;
            }
        }

        info!(
            classified = stats.classified,
            cached = stats.cached,
            fallback = stats.fallback,
            skipped = stats.skipped,
            "Enrichment complete"
        );
        stats
    }
}

fn apply(tx: &mut Transaction, resolution: Resolution) {
    let c = resolution.into_classification();

    tx.vendor = Some(c.vendor);
    tx.confidence_score = Some(c.confidence);
    fill_if_empty(&mut tx.category, c.category);
    fill_if_empty(&mut tx.tx_type, Some(c.tx_type));
    fill_if_empty(&mut tx.statement_type, Some(c.statement_type));
}

fn fill_if_empty(field: &mut Option<String>, value: Option<String>) {
    if field.as_deref().map_or(true, str::is_empty) {
        *field = value;
    }
}
