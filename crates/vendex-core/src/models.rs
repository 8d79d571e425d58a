//! Data models for Vendex

use serde::{Deserialize, Serialize};

/// Default transaction type when neither the source data nor the classifier supplies one
pub const DEFAULT_TX_TYPE: &str = "expense";

/// Default financial statement bucket
pub const DEFAULT_STATEMENT_TYPE: &str = "profit_loss";

/// Vendor name used when the classifier cannot identify one
pub const UNKNOWN_VENDOR: &str = "Unknown";

/// Confidence reported by the classifier when it omits one
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Confidence stamped on fallback classifications
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

/// A bank transaction read from CSV
///
/// Field names serialize in the same camelCase form as the CSV headers,
/// so dry-run output can be fed back in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub description: Option<String>,
    pub amount: f64,
    pub date: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub statement_type: Option<String>,
    pub vendor: Option<String>,
    pub vendor_verified: bool,
    pub confidence_score: Option<f64>,
    pub is_verified: bool,
    pub bank_account_id: Option<String>,
    pub account_id: Option<String>,
    pub balance: Option<f64>,
}

impl Transaction {
    /// Create a transaction with just a description and amount
    pub fn new(description: impl Into<String>, amount: f64) -> Self {
        Self {
            description: Some(description.into()),
            amount,
            ..Default::default()
        }
    }

    /// Non-empty description, if any
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }

    /// Whether a human has confirmed the vendor assignment
    pub fn has_verified_vendor(&self) -> bool {
        self.vendor_verified && self.vendor.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// Classifier output for a transaction description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorClassification {
    pub vendor: String,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: String,
    #[serde(rename = "statementType")]
    pub statement_type: String,
    pub confidence: f64,
}

impl VendorClassification {
    /// Low-confidence classification used when the classifier fails
    pub fn fallback() -> Self {
        Self {
            vendor: UNKNOWN_VENDOR.to_string(),
            category: None,
            tx_type: DEFAULT_TX_TYPE.to_string(),
            statement_type: DEFAULT_STATEMENT_TYPE.to_string(),
            confidence: FALLBACK_CONFIDENCE,
        }
    }
}

/// Aggregate result of uploading transactions to the store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadResult {
    /// Records in batches the store accepted
    pub success: usize,
    /// Records in batches the store rejected
    pub failed: usize,
    /// One message per failed batch, in batch order
    pub errors: Vec<String>,
}

/// A row in the store's `bank_transactions` table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub description: String,
    pub amount: f64,
    pub date: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub statement_type: String,
    pub vendor: Option<String>,
    pub vendor_verified: bool,
    pub confidence_score: Option<f64>,
    pub is_verified: bool,
    pub bank_connection_id: Option<String>,
    pub balance: Option<f64>,
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_hash: Option<String>,
}

impl From<&Transaction> for TransactionRecord {
    fn from(tx: &Transaction) -> Self {
        Self {
            description: tx.description.clone().unwrap_or_default(),
            amount: tx.amount,
            date: tx.date.clone(),
            category: tx.category.clone(),
            tx_type: or_default(&tx.tx_type, DEFAULT_TX_TYPE),
            statement_type: or_default(&tx.statement_type, DEFAULT_STATEMENT_TYPE),
            vendor: tx.vendor.clone(),
            vendor_verified: tx.vendor_verified,
            confidence_score: tx.confidence_score,
            is_verified: tx.is_verified,
            bank_connection_id: tx.bank_account_id.clone(),
            balance: tx.balance,
            account_id: tx.account_id.clone().or_else(|| tx.bank_account_id.clone()),
            import_hash: None,
        }
    }
}

/// Non-empty value, or the default
fn or_default(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_verified_vendor() {
        let mut tx = Transaction::new("NETFLIX.COM", -15.99);
        assert!(!tx.has_verified_vendor());

        tx.vendor_verified = true;
        assert!(!tx.has_verified_vendor());

        tx.vendor = Some(String::new());
        assert!(!tx.has_verified_vendor());

        tx.vendor = Some("Netflix".to_string());
        assert!(tx.has_verified_vendor());
    }

    #[test]
    fn test_fallback_classification() {
        let fallback = VendorClassification::fallback();
        assert_eq!(fallback.vendor, "Unknown");
        assert!(fallback.category.is_none());
        assert_eq!(fallback.tx_type, "expense");
        assert_eq!(fallback.statement_type, "profit_loss");
        assert!((fallback.confidence - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_from_transaction() {
        let tx = Transaction {
            description: Some("SHELL OIL 1234".to_string()),
            amount: -40.0,
            statement_type: Some("profit_loss".to_string()),
            bank_account_id: Some("bank-1".to_string()),
            ..Default::default()
        };

        let record = TransactionRecord::from(&tx);
        assert_eq!(record.description, "SHELL OIL 1234");
        assert_eq!(record.bank_connection_id.as_deref(), Some("bank-1"));
        // accountId falls back to bankAccountId
        assert_eq!(record.account_id.as_deref(), Some("bank-1"));
        assert!(!record.vendor_verified);
        assert!(!record.is_verified);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["statement_type"], "profit_loss");
        assert_eq!(json["type"], "expense");
        assert!(json.get("import_hash").is_none());
    }

    #[test]
    fn test_record_defaults_type_fields() {
        // Verified-vendor rows are never enriched, so their type fields may be absent
        let tx = Transaction {
            vendor: Some("Landlord LLC".to_string()),
            vendor_verified: true,
            tx_type: Some(String::new()),
            ..Transaction::new("CHECK 1042", -1800.0)
        };
        let record = TransactionRecord::from(&tx);
        assert_eq!(record.tx_type, "expense");
        assert_eq!(record.statement_type, "profit_loss");

        let tx = Transaction {
            tx_type: Some("income".to_string()),
            statement_type: Some("balance_sheet".to_string()),
            ..tx
        };
        let record = TransactionRecord::from(&tx);
        assert_eq!(record.tx_type, "income");
        assert_eq!(record.statement_type, "balance_sheet");
    }

    #[test]
    fn test_record_prefers_account_id() {
        let tx = Transaction {
            account_id: Some("acct-9".to_string()),
            bank_account_id: Some("bank-1".to_string()),
            ..Default::default()
        };
        let record = TransactionRecord::from(&tx);
        assert_eq!(record.account_id.as_deref(), Some("acct-9"));
        assert_eq!(record.description, "");
        assert_eq!(record.amount, 0.0);
    }

    #[test]
    fn test_transaction_serializes_camel_case() {
        let mut tx = Transaction::new("UBER TRIP", -12.5);
        tx.tx_type = Some("expense".to_string());
        tx.vendor_verified = true;

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "expense");
        assert_eq!(json["vendorVerified"], true);
        assert!(json.get("statementType").is_some());
    }
}
