//! Bitmap-based predicate index.
//!
//! Maintains one inverted index (value -> bitmap of handles) per field that
//! has been explicitly indexed via `CreatePredIndex`. Fields
//! that were never indexed are tracked nowhere here; [`PredicateIndex::eval`]
//! returns `None` the moment a condition references one, and the caller
//! (`Store`) falls back to a linear scan for that condition.

use std::collections::{HashMap, HashSet};

use roaring::RoaringBitmap;

use crate::metadata::{MetadataValue, StoreValue};
use crate::predicate::Condition;

/// A store-assigned handle identifying an entry, used as the roaring bitmap
/// element type. Distinct from an HNSW node id, though both are derived from
/// the same handle space.
pub type Handle = u32;

#[derive(Debug, Default)]
pub struct PredicateIndex {
    /// field -> value -> bitmap of handles holding that value for that field
    fields: HashMap<String, HashMap<MetadataValue, RoaringBitmap>>,
    /// Names of fields that have been explicitly indexed, even if currently
    /// empty. Distinguishes "indexed but no matches" from "not indexed".
    indexed_fields: HashSet<String>,
}

impl PredicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexed_fields.contains(field)
    }

    pub fn indexed_fields(&self) -> impl Iterator<Item = &String> {
        self.indexed_fields.iter()
    }

    /// Begins indexing `field`. Idempotent. Does not retroactively index
    /// already-inserted entries; the caller rebuilds from the primary map
    /// after calling this.
    pub fn create_field(&mut self, field: &str) {
        self.indexed_fields.insert(field.to_string());
        self.fields.entry(field.to_string()).or_default();
    }

    pub fn drop_field(&mut self, field: &str) {
        self.indexed_fields.remove(field);
        self.fields.remove(field);
    }

    /// Indexes every indexed field present in `value` under `handle`.
    pub fn insert(&mut self, handle: Handle, value: &StoreValue) {
        for field in &self.indexed_fields {
            if let Some(v) = value.get(field) {
                self.fields
                    .entry(field.clone())
                    .or_default()
                    .entry(v.clone())
                    .or_default()
                    .insert(handle);
            }
        }
    }

    pub fn remove(&mut self, handle: Handle, value: &StoreValue) {
        for field in &self.indexed_fields {
            if let Some(v) = value.get(field) {
                if let Some(field_map) = self.fields.get_mut(field) {
                    if let Some(bitmap) = field_map.get_mut(v) {
                        bitmap.remove(handle);
                    }
                }
            }
        }
    }

    fn bitmap_for(&self, field: &str, value: &MetadataValue) -> RoaringBitmap {
        self.fields
            .get(field)
            .and_then(|m| m.get(value))
            .cloned()
            .unwrap_or_default()
    }

    /// All handles holding any value for `field`, i.e. the field's
    /// "universe" for `NotEquals`/`NotIn` complementing.
    fn all_with_field(&self, field: &str) -> RoaringBitmap {
        self.fields
            .get(field)
            .map(|m| m.values().fold(RoaringBitmap::new(), |acc, bm| &acc | bm))
            .unwrap_or_default()
    }

    /// Evaluates `condition`, returning `None` if it references any field
    /// that isn't indexed (the caller must fall back to a scan in that
    /// case; a partial evaluation would silently miss non-indexed matches).
    pub fn eval(&self, condition: &Condition) -> Option<RoaringBitmap> {
        match condition {
            Condition::Equals(field, value) => {
                if !self.is_indexed(field) {
                    return None;
                }
                Some(self.bitmap_for(field, value))
            }
            Condition::NotEquals(field, value) => {
                if !self.is_indexed(field) {
                    return None;
                }
                let eq = self.bitmap_for(field, value);
                Some(&self.all_with_field(field) - &eq)
            }
            Condition::In(field, values) => {
                if !self.is_indexed(field) {
                    return None;
                }
                let mut result = RoaringBitmap::new();
                for v in values {
                    result |= self.bitmap_for(field, v);
                }
                Some(result)
            }
            Condition::NotIn(field, values) => {
                if !self.is_indexed(field) {
                    return None;
                }
                let mut matching = RoaringBitmap::new();
                for v in values {
                    matching |= self.bitmap_for(field, v);
                }
                Some(&self.all_with_field(field) - &matching)
            }
            Condition::And(a, b) => {
                let left = self.eval(a)?;
                let right = self.eval(b)?;
                Some(left & right)
            }
            Condition::Or(a, b) => {
                let left = self.eval(a)?;
                let right = self.eval(b)?;
                Some(left | right)
            }
        }
    }

    pub fn clear(&mut self) {
        self.fields.clear();
        self.indexed_fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(category: &str) -> StoreValue {
        StoreValue::new().with_field("category", category)
    }

    #[test]
    fn test_not_indexed_returns_none() {
        let index = PredicateIndex::new();
        assert!(index.eval(&Condition::equals("category", "x")).is_none());
    }

    #[test]
    fn test_equals_after_create_field() {
        let mut index = PredicateIndex::new();
        index.create_field("category");
        index.insert(1, &value("electronics"));
        index.insert(2, &value("books"));
        index.insert(3, &value("electronics"));

        let matches = index.eval(&Condition::equals("category", "electronics")).unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches.contains(1));
        assert!(matches.contains(3));
    }

    #[test]
    fn test_not_equals() {
        let mut index = PredicateIndex::new();
        index.create_field("status");
        index.insert(1, &StoreValue::new().with_field("status", "active"));
        index.insert(2, &StoreValue::new().with_field("status", "inactive"));

        let matches = index
            .eval(&Condition::not_equals("status", "active"))
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches.contains(2));
    }

    #[test]
    fn test_and_both_indexed() {
        let mut index = PredicateIndex::new();
        index.create_field("category");
        index.create_field("brand");
        index.insert(
            1,
            &StoreValue::new()
                .with_field("category", "electronics")
                .with_field("brand", "sony"),
        );
        index.insert(
            2,
            &StoreValue::new()
                .with_field("category", "electronics")
                .with_field("brand", "lg"),
        );

        let cond = Condition::equals("category", "electronics").and(Condition::equals("brand", "sony"));
        let matches = index.eval(&cond).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches.contains(1));
    }

    #[test]
    fn test_and_with_non_indexed_field_falls_back() {
        let mut index = PredicateIndex::new();
        index.create_field("category");
        let cond = Condition::equals("category", "electronics").and(Condition::equals("brand", "sony"));
        assert!(index.eval(&cond).is_none());
    }

    #[test]
    fn test_remove() {
        let mut index = PredicateIndex::new();
        index.create_field("category");
        let v = value("electronics");
        index.insert(1, &v);
        index.insert(2, &v);
        index.remove(1, &v);

        let matches = index.eval(&Condition::equals("category", "electronics")).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches.contains(2));
    }
}
