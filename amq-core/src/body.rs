//! Ordered message body

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered string-to-string body of an AMQ message.
///
/// Insertion order survives encoding and decoding, which keeps the signing
/// input identical on both ends of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageBody(IndexMap<String, String>);

impl MessageBody {
    /// Create an empty body
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, consuming and returning the body for chaining
    pub fn add(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert an entry in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// True when the body holds no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
