//! Dynamic attribute bags attached to conversations, messages, and decisions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single value in an attribute bag: a tagged union of the primitive
/// shapes callers actually pass in (string, number, bool, sequence, or a
/// nested bag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Str(String),
    Num(f64),
    Bool(bool),
    Seq(Vec<AttributeValue>),
    Bag(AttributeBag),
}

/// An opaque key-value bag. Keys are ordered (`BTreeMap`) so that
/// serialized form is stable for tests and storage round-tripping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeBag(pub BTreeMap<String, AttributeValue>);

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    /// Serialize to the TEXT-column form used at the storage boundary.
    pub fn to_storage_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parse from the TEXT-column form. NULL/empty strings decode to an
    /// empty bag rather than erroring — storage columns are often `NULL`
    /// before the first write.
    pub fn from_storage_text(text: Option<&str>) -> Self {
        match text {
            None => Self::default(),
            Some(s) if s.trim().is_empty() => Self::default(),
            Some(s) => serde_json::from_str(s).unwrap_or_default(),
        }
    }
}

/// Parse a TEXT-encoded JSON array column into a `Vec<String>`.
/// NULL and empty string both decode to an empty vector.
pub fn sequence_from_storage_text(text: Option<&str>) -> Vec<String> {
    match text {
        None => Vec::new(),
        Some(s) if s.trim().is_empty() => Vec::new(),
        Some(s) => serde_json::from_str(s).unwrap_or_default(),
    }
}

/// Serialize a `Vec<String>` into the TEXT-encoded JSON array form.
pub fn sequence_to_storage_text(seq: &[String]) -> String {
    serde_json::to_string(seq).unwrap_or_else(|_| "[]".to_string())
}
