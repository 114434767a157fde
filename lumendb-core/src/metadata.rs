//! Metadata value and the per-entry value map.
//!
//! The dual text/binary nature of a metadata value is modeled as a tagged
//! variant with variant-aware hashing/equality, not inheritance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single metadata value. Equality and hashing are variant-aware: a
/// `RawString` never equals a `Binary` even if their bytes coincide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataValue {
    RawString(String),
    Binary(Vec<u8>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::RawString(s) => Some(s),
            MetadataValue::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            MetadataValue::RawString(_) => None,
            MetadataValue::Binary(b) => Some(b),
        }
    }

    /// Byte size counted toward a store's [`crate::store::StoreInfo`],
    /// the tag byte plus the payload (and a 4-byte length prefix for
    /// `Binary`, matching the wire/snapshot encoding in [`crate::snapshot`]).
    pub fn byte_size(&self) -> usize {
        1 + match self {
            MetadataValue::RawString(s) => s.len(),
            MetadataValue::Binary(b) => 4 + b.len(),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::RawString(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::RawString(s)
    }
}

impl From<Vec<u8>> for MetadataValue {
    fn from(b: Vec<u8>) -> Self {
        MetadataValue::Binary(b)
    }
}

/// Mapping from field name to [`MetadataValue`]. Keys are unique within a
/// value; insertion order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreValue {
    fields: HashMap<String, MetadataValue>,
}

impl StoreValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(fields: HashMap<String, MetadataValue>) -> Self {
        Self { fields }
    }

    /// Adds a field. Chainable.
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<MetadataValue>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<MetadataValue>,
    {
        self.fields.insert(key.into(), value.into());
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.fields.get(key)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<MetadataValue> {
        self.fields.remove(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.fields.iter()
    }

    /// Total byte size of keys plus values, used for allocator accounting.
    pub fn byte_size(&self) -> usize {
        self.fields
            .iter()
            .map(|(k, v)| k.len() + v.byte_size())
            .sum()
    }

    pub fn into_inner(self) -> HashMap<String, MetadataValue> {
        self.fields
    }
}
