//! REST client for the transaction store
//!
//! The store is a PostgREST-style backend (Supabase): tables live under
//! `/rest/v1/<table>` and edge functions under `/functions/v1/<name>`.
//! Every request carries the service key both as `apikey` and as a bearer
//! token.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::models::TransactionRecord;

/// Table receiving uploaded transactions
pub const TRANSACTIONS_TABLE: &str = "bank_transactions";

/// Column embedded by the embedding function
pub const EMBEDDING_TEXT_FIELD: &str = "description";

#[derive(Clone)]
pub struct StoreClient {
    http_client: Client,
    base_url: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct VendorRow {
    vendor_name: Option<String>,
}

/// Body of the generate-embeddings function call
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddingRequest<'a> {
    table: &'a str,
    text_field: &'a str,
    limit: usize,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    results: EmbeddingResults,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingResults {
    #[serde(default)]
    success: u64,
}

impl StoreClient {
    pub fn new(base_url: &str, key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.url, &config.key)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.key) {
            headers.insert("apikey", value);
        }
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http_client
            .get(format!("{}{}", self.base_url, path))
            .headers(self.headers())
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http_client
            .post(format!("{}{}", self.base_url, path))
            .headers(self.headers())
    }

    /// Names of vendors the store already knows about
    pub async fn fetch_vendor_names(&self) -> Result<Vec<String>> {
        let response = self
            .get("/rest/v1/vendor_categorizations?select=vendor_name")
            .send()
            .await?;
        let response = check_status(response).await?;
        let rows: Vec<VendorRow> = response.json().await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| r.vendor_name)
            .filter(|name| !name.is_empty())
            .collect())
    }

    /// Insert one batch of records
    ///
    /// With `ignore_duplicates`, rows whose `import_hash` already exists are
    /// skipped by the store instead of inserted again.
    pub async fn insert_transactions(
        &self,
        records: &[TransactionRecord],
        ignore_duplicates: bool,
    ) -> Result<()> {
        let (path, prefer) = if ignore_duplicates {
            (
                format!("/rest/v1/{}?on_conflict=import_hash", TRANSACTIONS_TABLE),
                "resolution=ignore-duplicates,return=representation",
            )
        } else {
            (
                format!("/rest/v1/{}", TRANSACTIONS_TABLE),
                "return=representation",
            )
        };

        let response = self
            .post(&path)
            .header("Prefer", prefer)
            .json(records)
            .send()
            .await?;
        check_status(response).await?;
        debug!(records = records.len(), "Inserted batch");
        Ok(())
    }

    /// Ask the store to embed up to `limit` records that lack embeddings
    ///
    /// Returns the number of embeddings the function reports as generated.
    pub async fn generate_embeddings(&self, limit: usize) -> Result<u64> {
        let request = EmbeddingRequest {
            table: TRANSACTIONS_TABLE,
            text_field: EMBEDDING_TEXT_FIELD,
            limit,
        };
        let response = self
            .post("/functions/v1/generate-embeddings")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: EmbeddingResponse = response.json().await.unwrap_or_default();
        Ok(body.results.success)
    }
}

/// Turn non-2xx responses into `Error::Store` carrying the response body
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Store(format!("{} {}: {}", status, url, body.trim())))
}
