//! CSV import of bank transactions
//!
//! Rows are keyed by header name. Only the columns Vendex understands are
//! read; anything else in the file is ignored. Rows shorter than the header
//! are accepted and their missing cells treated as absent.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};

use crate::error::Result;
use crate::models::Transaction;

/// Read transactions from a CSV file on disk
pub fn read_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let file = File::open(path)?;
    parse_transactions(file)
}

/// Parse transactions from any CSV reader
pub fn parse_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr.byte_headers()?.clone();
    let columns = Columns::new(&headers);
    let mut transactions = Vec::new();

    // Byte records so a stray non-UTF-8 byte only affects its own cell
    for result in rdr.byte_records() {
        let record = result?;
        transactions.push(columns.transaction(&record));
    }

    Ok(transactions)
}

/// Header name to column index lookup
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(headers: &ByteRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (String::from_utf8_lossy(h).into_owned(), i))
            .collect();
        Self { index }
    }

    /// Cell as text, with invalid UTF-8 replaced by U+FFFD
    fn raw<'r>(&self, record: &'r ByteRecord, name: &str) -> Option<Cow<'r, str>> {
        self.index
            .get(name)
            .and_then(|&i| record.get(i))
            .map(String::from_utf8_lossy)
    }

    /// Cell value with empty strings mapped to None
    fn text(&self, record: &ByteRecord, name: &str) -> Option<String> {
        self.raw(record, name)
            .filter(|s| !s.is_empty())
            .map(Cow::into_owned)
    }

    fn flag(&self, record: &ByteRecord, name: &str) -> bool {
        self.raw(record, name).is_some_and(|s| parse_flag(&s))
    }

    fn amount(&self, record: &ByteRecord, name: &str) -> Option<f64> {
        self.raw(record, name).and_then(|s| parse_amount(&s))
    }

    fn transaction(&self, record: &ByteRecord) -> Transaction {
        Transaction {
            description: self.text(record, "description"),
            amount: self.amount(record, "amount").unwrap_or(0.0),
            date: self.text(record, "date"),
            category: self.text(record, "category"),
            tx_type: self.text(record, "type"),
            statement_type: self.text(record, "statementType"),
            vendor: self.text(record, "vendor"),
            vendor_verified: self.flag(record, "vendorVerified"),
            confidence_score: None,
            is_verified: self.flag(record, "isVerified"),
            bank_account_id: self.text(record, "bankAccountId"),
            account_id: self.text(record, "accountId"),
            balance: self.amount(record, "balance"),
        }
    }
}

/// Parse a monetary cell, tolerating a currency sign and thousands separators
///
/// Returns None for anything that isn't a finite number.
pub fn parse_amount(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a boolean-ish cell
fn parse_flag(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y"
    )
}
