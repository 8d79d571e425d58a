//! JSON parsing helpers for classifier responses
//!
//! Models asked for JSON-only output still occasionally wrap it in prose or
//! code fences, so the outermost `{...}` is extracted before parsing.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{
    VendorClassification, DEFAULT_CONFIDENCE, DEFAULT_STATEMENT_TYPE, DEFAULT_TX_TYPE,
    UNKNOWN_VENDOR,
};

/// Parse a vendor classification, filling defaults for missing keys
pub fn parse_classification(response: &str) -> Result<VendorClassification> {
    let json_str = extract_json(response)?;
    let value: Value = serde_json::from_str(json_str).map_err(|e| {
        Error::InvalidData(format!(
            "Invalid JSON from classifier: {} | Raw: {}",
            e,
            truncate(json_str)
        ))
    })?;

    let object = value.as_object().ok_or_else(|| {
        Error::InvalidData(format!(
            "Classifier returned non-object JSON | Raw: {}",
            truncate(json_str)
        ))
    })?;

    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let confidence = object
        .get("confidence")
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_CONFIDENCE);

    Ok(VendorClassification {
        vendor: text("vendor").unwrap_or_else(|| UNKNOWN_VENDOR.to_string()),
        category: text("category"),
        tx_type: text("type").unwrap_or_else(|| DEFAULT_TX_TYPE.to_string()),
        statement_type: text("statementType").unwrap_or_else(|| DEFAULT_STATEMENT_TYPE.to_string()),
        confidence,
    })
}

fn extract_json(response: &str) -> Result<&str> {
    let response = response.trim();
    match (response.find('{'), response.rfind('}')) {
        (Some(s), Some(e)) if s < e => Ok(&response[s..=e]),
        _ => Err(Error::InvalidData(format!(
            "No JSON found in classifier response | Raw: {}",
            truncate(response)
        ))),
    }
}

/// Truncate long responses for error messages
fn truncate(s: &str) -> String {
    match s.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_response() {
        let response = r#"{"vendor": "Amazon", "category": "Shopping", "type": "expense", "statementType": "profit_loss", "confidence": 0.95}"#;
        let c = parse_classification(response).unwrap();
        assert_eq!(c.vendor, "Amazon");
        assert_eq!(c.category.as_deref(), Some("Shopping"));
        assert_eq!(c.tx_type, "expense");
        assert_eq!(c.statement_type, "profit_loss");
        assert!((c.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_parse_missing_keys_use_defaults() {
        let c = parse_classification("{}").unwrap();
        assert_eq!(c.vendor, "Unknown");
        assert!(c.category.is_none());
        assert_eq!(c.tx_type, "expense");
        assert_eq!(c.statement_type, "profit_loss");
        assert!((c.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_parse_null_category() {
        let c = parse_classification(r#"{"vendor": "Payroll", "category": null, "type": "income"}"#)
            .unwrap();
        assert_eq!(c.vendor, "Payroll");
        assert!(c.category.is_none());
        assert_eq!(c.tx_type, "income");
    }

    #[test]
    fn test_parse_wrapped_in_prose() {
        let response = "Sure! Here you go:\n```json\n{\"vendor\": \"Netflix\", \"confidence\": \"0.9\"}\n```";
        let c = parse_classification(response).unwrap();
        assert_eq!(c.vendor, "Netflix");
        assert!((c.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_parse_confidence_clamped() {
        let c = parse_classification(r#"{"vendor": "X", "confidence": 7}"#).unwrap();
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn test_parse_no_json() {
        let err = parse_classification("I cannot help with that").unwrap_err();
        assert!(err.to_string().contains("No JSON found"));
    }

    #[test]
    fn test_parse_malformed_json() {
        let err = parse_classification(r#"{"vendor": "Amazon",}"#).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }
}
