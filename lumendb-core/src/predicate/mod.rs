//! Predicate expressions for metadata-based filtering of `GetSimN`/`GetPred`.
//!
//! A `Condition` combines leaf comparisons on a single field with `And`/`Or`
//! composition. There is no `Not`: a predicate must be expressible as a
//! bitmap union/intersection without complementing against "all ids", since
//! a non-indexed field has no "all ids" universe to complement against (see
//! [`bitmap_index`]).

pub mod bitmap_index;

pub use bitmap_index::PredicateIndex;

use serde::{Deserialize, Serialize};

use crate::metadata::{MetadataValue, StoreValue};

/// A predicate over a store entry's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Equals(String, MetadataValue),
    NotEquals(String, MetadataValue),
    In(String, Vec<MetadataValue>),
    NotIn(String, Vec<MetadataValue>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    pub fn equals<K: Into<String>, V: Into<MetadataValue>>(key: K, value: V) -> Self {
        Condition::Equals(key.into(), value.into())
    }

    pub fn not_equals<K: Into<String>, V: Into<MetadataValue>>(key: K, value: V) -> Self {
        Condition::NotEquals(key.into(), value.into())
    }

    pub fn and(self, other: Condition) -> Self {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Self {
        Condition::Or(Box::new(self), Box::new(other))
    }

    /// Evaluates this condition directly against a value's metadata, without
    /// consulting any index. Used as the scan fallback for non-indexed
    /// fields, and as the ground truth in tests against the indexed path.
    ///
    /// A field absent from `value` never matches `Equals`/`In`, and always
    /// matches `NotEquals`/`NotIn` - a missing field is "not equal to"
    /// anything.
    pub fn matches(&self, value: &StoreValue) -> bool {
        match self {
            Condition::Equals(field, target) => value.get(field) == Some(target),
            Condition::NotEquals(field, target) => value.get(field) != Some(target),
            Condition::In(field, targets) => {
                value.get(field).map(|v| targets.contains(v)).unwrap_or(false)
            }
            Condition::NotIn(field, targets) => {
                !value.get(field).map(|v| targets.contains(v)).unwrap_or(false)
            }
            Condition::And(a, b) => a.matches(value) && b.matches(value),
            Condition::Or(a, b) => a.matches(value) || b.matches(value),
        }
    }

    /// The set of field names this condition reads, used to decide whether
    /// every referenced field is indexed before trusting a bitmap lookup.
    pub fn referenced_fields(&self, out: &mut Vec<String>) {
        match self {
            Condition::Equals(f, _)
            | Condition::NotEquals(f, _)
            | Condition::In(f, _)
            | Condition::NotIn(f, _) => out.push(f.clone()),
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.referenced_fields(out);
                b.referenced_fields(out);
            }
        }
    }
}
