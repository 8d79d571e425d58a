//! Batch upload of enriched transactions
//!
//! Transactions are mapped to store rows and posted in fixed-size batches.
//! A rejected batch is counted and recorded but does not stop later
//! batches. Once every batch has been attempted, the embedding function is
//! triggered exactly once; its outcome is logged and never affects the
//! upload result.

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::models::{Transaction, TransactionRecord, UploadResult};
use crate::store::StoreClient;

/// Default number of records per insert request
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Default number of records the embedding function processes per trigger
pub const DEFAULT_EMBEDDINGS_LIMIT: usize = 50;

/// De-duplication key for a transaction
///
/// Fields are separated so that shifting text between description and date
/// changes the hash.
pub fn import_hash(tx: &Transaction) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tx.date.as_deref().unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(tx.description.as_deref().unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(tx.amount.to_be_bytes());
    hex::encode(hasher.finalize())
}

pub struct Uploader {
    store: StoreClient,
    batch_size: usize,
    embeddings_limit: usize,
    dedupe: bool,
}

impl Uploader {
    pub fn new(store: StoreClient) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
            embeddings_limit: DEFAULT_EMBEDDINGS_LIMIT,
            dedupe: false,
        }
    }

    /// Records per batch (values below 1 are treated as 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_embeddings_limit(mut self, limit: usize) -> Self {
        self.embeddings_limit = limit;
        self
    }

    /// Tag records with `import_hash` and let the store skip rows it already has
    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Map a transaction to the store row
    pub fn record(&self, tx: &Transaction) -> TransactionRecord {
        let mut record = TransactionRecord::from(tx);
        if self.dedupe {
            record.import_hash = Some(import_hash(tx));
        }
        record
    }

    /// Upload all transactions and trigger embedding generation
    pub async fn upload(&self, transactions: &[Transaction]) -> UploadResult {
        let records: Vec<TransactionRecord> =
            transactions.iter().map(|tx| self.record(tx)).collect();
        let total_batches = records.len().div_ceil(self.batch_size);
        let mut result = UploadResult::default();

        for (i, batch) in records.chunks(self.batch_size).enumerate() {
            let batch_num = i + 1;
            match self.store.insert_transactions(batch, self.dedupe).await {
                Ok(()) => {
                    result.success += batch.len();
                    info!(
                        "Uploaded batch {}/{} ({} records)",
                        batch_num,
                        total_batches,
                        batch.len()
                    );
                }
                Err(e) => {
                    result.failed += batch.len();
                    warn!(batch = batch_num, error = %e, "Batch upload failed");
                    result.errors.push(format!("Batch {}: {}", batch_num, e));
                }
            }
        }

        self.trigger_embeddings().await;
        result
    }

    async fn trigger_embeddings(&self) {
        match self.store.generate_embeddings(self.embeddings_limit).await {
            Ok(generated) => info!("Generated {} embeddings", generated),
            Err(e) => warn!(error = %e, "Embedding generation failed"),
        }
    }
}
