//! Trace Metadata Dictionary
//!
//! This module defines `Metadata` - the ordered key/value dictionary
//! embedded right after the file header of every trace.
//!
//! ## Structure
//! - Keys and values are UTF-8 text
//! - Keys are unique and non-empty; values may be empty
//! - Insertion order is preserved and equals on-wire order
//!
//! Typical entries describe the recording context: track name, car model,
//! game build, driver id. The codec treats all of it as opaque text.
//!
//! ## Example
//! ```ignore
//! let mut metadata = Metadata::new();
//! metadata.insert("track", "monza")?;
//! metadata.insert("car", "f1")?;
//! assert_eq!(metadata.get("track"), Some("monza"));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ordered mapping from UTF-8 key to UTF-8 value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    ///
    /// Fails with `InvalidMetadata` for an empty key and
    /// `DuplicateMetadataKey` when the key is already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::InvalidMetadata("empty key".to_string()));
        }
        if self.contains_key(&key) {
            return Err(Error::DuplicateMetadataKey(key));
        }
        self.entries.push((key, value.into()));
        Ok(())
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
