//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! parsing of stored values so every entity reports malformed rows the same
//! way.

use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} id")))
}

/// Parse a decimal stored as text.
pub(crate) fn parse_decimal(value: &str, label: &str) -> ResultEngine<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|_| EngineError::InvalidRate(format!("invalid {label}: {value}")))
}

/// Parse a JSON string list column (proof URLs).
pub(crate) fn parse_string_list(value: &str, label: &str) -> ResultEngine<Vec<String>> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} list")))
}

/// Serialize a string list for storage.
pub(crate) fn encode_string_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

/// Trim an optional free-text value, mapping blanks to `None`.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Trim a required identifier, rejecting blanks.
pub(crate) fn normalize_required(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidId(format!("{label} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Trim and de-duplicate URLs, dropping blanks.
pub(crate) fn normalize_urls(urls: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
        if !out.iter().any(|existing| existing == url) {
            out.push(url.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_lists_round_trip() {
        let urls = vec!["https://a/1.png".to_string(), "https://a/2.png".to_string()];
        let encoded = encode_string_list(&urls);
        assert_eq!(parse_string_list(&encoded, "proof").unwrap(), urls);
        assert!(parse_string_list("", "proof").unwrap().is_empty());
        assert!(parse_string_list("{", "proof").is_err());
    }

    #[test]
    fn urls_are_trimmed_and_deduplicated() {
        let urls = vec![
            " https://a/1.png ".to_string(),
            String::new(),
            "https://a/1.png".to_string(),
        ];
        assert_eq!(normalize_urls(&urls), vec!["https://a/1.png".to_string()]);
    }
}
