// ABOUTME: The HLR lookup record and its valid/invalid classification
// ABOUTME: Records stay raw JSON maps so cache and store round-trip them verbatim

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Outcome of classifying an HLR record.
///
/// `Valid` means a live, reachable subscriber: exactly `error == 0` and
/// `status == 0`. Everything else (absent subscribers, unsupported
/// networks 191/192, fixed lines 193, non-zero status) is `Invalid`.
/// The function is total: any record classifies to exactly one of the
/// two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Valid,
    Invalid,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Valid => "valid",
            Classification::Invalid => "invalid",
        }
    }
}

/// One HLR provider record for an MSISDN.
///
/// The provider's payload is an open JSON object whose field set varies
/// by network and error condition, so the record wraps the raw map and
/// exposes typed accessors for the fields the gateway interprets. The
/// map is what gets cached and persisted, keeping warmup lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HlrRecord(Map<String, Value>);

impl HlrRecord {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// The record synthesized when the provider answers 200 with no data
    /// for the queried number.
    pub fn empty_response(msisdn: &str) -> Self {
        let value = json!({
            "number": msisdn,
            "error": 1,
            "status": 1,
            "status_message": "Empty response from HLR",
        });
        match value {
            Value::Object(map) => Self(map),
            _ => Self(Map::new()),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn int_field(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Provider fields can arrive as numbers or strings depending on the
    /// upstream; normalize to a string for storage.
    fn stringy_field(&self, key: &str) -> Option<String> {
        match self.0.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Provider error code; absent reads as 0.
    pub fn error(&self) -> i64 {
        self.int_field("error").unwrap_or(0)
    }

    /// Provider status code; absent reads as 1 so an incomplete record
    /// can never classify as a live subscriber.
    pub fn status(&self) -> i64 {
        self.int_field("status").unwrap_or(1)
    }

    pub fn present(&self) -> Option<&str> {
        self.str_field("present")
    }

    pub fn mcc(&self) -> Option<String> {
        self.stringy_field("mcc")
    }

    pub fn mnc(&self) -> Option<String> {
        self.stringy_field("mnc")
    }

    pub fn network(&self) -> Option<&str> {
        self.str_field("network")
    }

    pub fn network_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    pub fn ported(&self) -> Option<bool> {
        self.0.get("ported").and_then(Value::as_bool)
    }

    pub fn number(&self) -> Option<&str> {
        self.str_field("number")
    }

    /// Classify this record. Deterministic on the record contents.
    pub fn classify(&self) -> Classification {
        if self.error() == 0 && self.status() == 0 {
            Classification::Valid
        } else {
            Classification::Invalid
        }
    }

    /// Stamp the classification into the map so it travels with the
    /// record through cache and store.
    pub fn stamp_classification(&mut self) {
        let classification = self.classify();
        self.0.insert(
            "classification".to_string(),
            Value::String(classification.as_str().to_string()),
        );
    }

    /// The stamped classification, recomputed when absent (warmup rows
    /// written before stamping existed).
    pub fn classification(&self) -> Classification {
        match self.str_field("classification") {
            Some("valid") => Classification::Valid,
            Some("invalid") => Classification::Invalid,
            _ => self.classify(),
        }
    }
}
