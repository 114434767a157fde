//! A single named collection of fixed-dimension embeddings and metadata.
//!
//! `Store` owns the primary vector/value map, the predicate indexes, and any
//! non-linear (HNSW/k-d tree) indexes for one collection. The catalog
//! (`crate::catalog`) is the only thing that constructs a `Store` and
//! decides its locking; `Store`'s own methods assume the caller already
//! holds the appropriate read/write access.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::distance::SimilarityAlgorithm;
use crate::error::{Error, Result};
use crate::index::hnsw::HnswIndex;
use crate::index::kdtree::KdTree;
use crate::index::{IndexSearchResult, NonLinearIndexConfig, NonLinearKind};
use crate::limits::BoundedAllocator;
use crate::metadata::StoreValue;
use crate::predicate::{Condition, PredicateIndex};
use crate::vector::Vector;

/// Entry handle: the roaring-bitmap-compatible id used by both the predicate
/// index and the non-linear indexes for one store. `u32` because `roaring`
/// bitmaps only hold `u32` elements.
pub type Handle = u32;

/// How many entries a non-linear `GetSimN` over-fetches before applying a
/// predicate filter, when one is supplied.
const OVER_FETCH_FACTOR: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertCount {
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreInfo {
    pub name: String,
    pub entry_count: usize,
    pub size_bytes: u64,
    pub predicate_fields: Vec<String>,
    pub non_linear_kinds: Vec<NonLinearKind>,
    pub dimension: usize,
}

enum NonLinearInstance {
    KdTree(KdTree),
    Hnsw(HnswIndex),
}

impl NonLinearInstance {
    fn kind(&self) -> NonLinearKind {
        match self {
            NonLinearInstance::KdTree(_) => NonLinearKind::KdTree,
            NonLinearInstance::Hnsw(_) => NonLinearKind::Hnsw,
        }
    }

    fn config(&self) -> NonLinearIndexConfig {
        match self {
            NonLinearInstance::KdTree(t) => NonLinearIndexConfig::KdTree(t.config_clone()),
            NonLinearInstance::Hnsw(h) => NonLinearIndexConfig::Hnsw(h.config().clone()),
        }
    }

    fn insert(&mut self, handle: Handle, vector: Vector) -> Result<()> {
        match self {
            NonLinearInstance::KdTree(t) => t.insert(handle as u64, vector),
            NonLinearInstance::Hnsw(h) => h.insert(handle as u64, vector),
        }
    }

    fn delete(&mut self, handle: Handle) -> Result<()> {
        match self {
            NonLinearInstance::KdTree(t) => {
                t.delete(handle as u64);
                Ok(())
            }
            NonLinearInstance::Hnsw(h) => h.delete(handle as u64),
        }
    }

    fn search(&mut self, probe: &[f32], k: usize, ef: Option<usize>) -> Result<Vec<IndexSearchResult>> {
        match self {
            NonLinearInstance::KdTree(t) => t.search(probe, k),
            NonLinearInstance::Hnsw(h) => h.search(probe, k, ef),
        }
    }
}

struct Entry {
    vector: Arc<Vector>,
    value: StoreValue,
}

/// One logical collection: primary map, secondary indexes, stats, and a
/// reference to the process-wide allocator budget.
pub struct Store {
    dimension: usize,
    entries: HashMap<Handle, Entry>,
    by_vector: HashMap<Arc<Vector>, Handle>,
    next_handle: Handle,
    predicate_index: PredicateIndex,
    non_linear: HashMap<NonLinearKind, Mutex<NonLinearInstance>>,
    size_bytes: u64,
    allocator: Arc<BoundedAllocator>,
}

impl Store {
    pub fn new(
        dimension: usize,
        predicate_fields: &[String],
        non_linear: &[NonLinearIndexConfig],
        allocator: Arc<BoundedAllocator>,
    ) -> Self {
        let mut predicate_index = PredicateIndex::new();
        for field in predicate_fields {
            predicate_index.create_field(field);
        }

        let mut non_linear_map = HashMap::new();
        for config in non_linear {
            let instance = match config.clone() {
                NonLinearIndexConfig::KdTree(cfg) => NonLinearInstance::KdTree(KdTree::new(cfg)),
                NonLinearIndexConfig::Hnsw(cfg) => NonLinearInstance::Hnsw(HnswIndex::new(dimension, cfg)),
            };
            non_linear_map.insert(instance.kind(), Mutex::new(instance));
        }

        Self {
            dimension,
            entries: HashMap::new(),
            by_vector: HashMap::new(),
            next_handle: 0,
            predicate_index,
            non_linear: non_linear_map,
            size_bytes: 0,
            allocator,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn entry_bytes(vector: &Vector, value: &StoreValue) -> u64 {
        (8 + vector.dimension() * 4 + value.byte_size()) as u64
    }

    fn check_dimension(&self, vector: &Vector) -> Result<()> {
        if vector.dimension() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                got: vector.dimension(),
            });
        }
        Ok(())
    }

    /// Net allocator delta `incoming` would cost if applied in order,
    /// without mutating any store state. A vector appearing more than once
    /// in `incoming` is accounted against the last occurrence's byte size,
    /// matching how the mutation loop in `set` actually settles it.
    fn net_reservation_delta(&self, incoming: &[(Vector, StoreValue)]) -> i64 {
        let mut staged_bytes: HashMap<&Vector, u64> = HashMap::new();
        let mut delta: i64 = 0;
        for (vector, value) in incoming {
            let new_bytes = Self::entry_bytes(vector, value);
            if let Some(&prior_bytes) = staged_bytes.get(vector) {
                delta += new_bytes as i64 - prior_bytes as i64;
            } else if let Some(&handle) = self.by_vector.get(vector) {
                let entry = &self.entries[&handle];
                let old_bytes = Self::entry_bytes(&entry.vector, &entry.value);
                delta += new_bytes as i64 - old_bytes as i64;
            } else {
                delta += new_bytes as i64;
            }
            staged_bytes.insert(vector, new_bytes);
        }
        delta
    }

    /// Upserts entries, maintaining predicate indexes delta-wise and
    /// inserting new vectors into every active non-linear index.
    /// Re-inserting an existing vector **replaces** its value and never
    /// touches non-linear indexes, since the vector key itself hasn't
    /// changed.
    ///
    /// The whole batch's net allocator delta is reserved up front: if the
    /// budget can't cover it, this returns `Err` before touching any store
    /// state, rather than leaving entries `0..k` applied for whichever
    /// entry `k` the allocator would have rejected.
    pub fn set(&mut self, incoming: Vec<(Vector, StoreValue)>) -> Result<UpsertCount> {
        for (vector, _) in &incoming {
            self.check_dimension(vector)?;
        }

        let delta = self.net_reservation_delta(&incoming);
        if delta > 0 {
            self.allocator.reserve(delta as u64)?;
        }

        let mut count = UpsertCount::default();
        for (vector, value) in incoming {
            let new_bytes = Self::entry_bytes(&vector, &value);

            if let Some(&handle) = self.by_vector.get(&vector) {
                let old_value = std::mem::replace(&mut self.entries.get_mut(&handle).unwrap().value, value.clone());
                let old_bytes = Self::entry_bytes(&vector, &old_value);
                self.predicate_index.remove(handle, &old_value);
                self.predicate_index.insert(handle, &value);
                self.size_bytes = self.size_bytes - old_bytes + new_bytes;
                count.updated += 1;
            } else {
                let handle = self.next_handle;
                self.next_handle += 1;

                let arc_vector = Arc::new(vector);
                self.predicate_index.insert(handle, &value);
                for instance in self.non_linear.values() {
                    instance.lock().insert(handle, (*arc_vector).clone())?;
                }
                self.by_vector.insert(arc_vector.clone(), handle);
                self.entries.insert(
                    handle,
                    Entry {
                        vector: arc_vector,
                        value,
                    },
                );
                self.size_bytes += new_bytes;
                count.inserted += 1;
            }
        }
        if delta < 0 {
            self.allocator.release((-delta) as u64);
        }
        Ok(count)
    }

    pub fn get_key(&self, vectors: &[Vector]) -> Vec<(Vector, StoreValue)> {
        vectors
            .iter()
            .filter_map(|v| {
                let handle = *self.by_vector.get(v)?;
                let entry = &self.entries[&handle];
                Some(((*entry.vector).clone(), entry.value.clone()))
            })
            .collect()
    }

    fn full_scan(&self, condition: &Condition) -> Vec<Handle> {
        self.entries
            .iter()
            .filter(|(_, entry)| condition.matches(&entry.value))
            .map(|(&handle, _)| handle)
            .collect()
    }

    /// Resolves `condition` to a handle set, preferring the predicate index
    /// and falling back to a full scan when any referenced field isn't
    /// indexed.
    fn resolve_condition(&self, condition: &Condition) -> Vec<Handle> {
        match self.predicate_index.eval(condition) {
            Some(bitmap) => bitmap.iter().collect(),
            None => self.full_scan(condition),
        }
    }

    pub fn get_pred(&self, condition: &Condition) -> Vec<(Vector, StoreValue)> {
        self.resolve_condition(condition)
            .into_iter()
            .map(|handle| {
                let entry = &self.entries[&handle];
                ((*entry.vector).clone(), entry.value.clone())
            })
            .collect()
    }

    /// Nearest-`n` search: a linear scan (optionally narrowed by a
    /// predicate before scoring) or a non-linear index search (filtered
    /// after candidate generation). `ef` overrides the HNSW index's
    /// configured `ef_search` for this query only; ignored by every other
    /// algorithm.
    pub fn get_sim_n(
        &self,
        probe: &Vector,
        n: usize,
        algorithm: SimilarityAlgorithm,
        condition: Option<&Condition>,
        ef: Option<usize>,
    ) -> Result<Vec<(Vector, StoreValue, f32)>> {
        self.check_dimension(probe)?;
        if n == 0 {
            return Err(Error::ClosestNIsZero);
        }

        if let Some(metric) = algorithm.as_linear() {
            let candidate_handles: Vec<Handle> = match condition {
                Some(cond) => self.resolve_condition(cond),
                None => {
                    let mut handles: Vec<Handle> = self.entries.keys().copied().collect();
                    handles.sort_unstable();
                    handles
                }
            };
            let mut sorted_handles = candidate_handles;
            sorted_handles.sort_unstable();

            let mut scored: Vec<(Handle, f32)> = sorted_handles
                .into_iter()
                .map(|handle| {
                    let entry = &self.entries[&handle];
                    let score = metric.score(probe.as_slice(), entry.vector.as_slice());
                    (handle, score)
                })
                .collect();

            scored.sort_by(|a, b| {
                let ord = a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal);
                if metric.lower_is_closer() {
                    ord
                } else {
                    ord.reverse()
                }
            });

            Ok(scored
                .into_iter()
                .take(n)
                .map(|(handle, score)| {
                    let entry = &self.entries[&handle];
                    ((*entry.vector).clone(), entry.value.clone(), score)
                })
                .collect())
        } else {
            let kind = match algorithm {
                SimilarityAlgorithm::KdTree => NonLinearKind::KdTree,
                SimilarityAlgorithm::Hnsw => NonLinearKind::Hnsw,
                _ => unreachable!("as_linear() already handled the linear algorithms"),
            };
            let instance = self
                .non_linear
                .get(&kind)
                .ok_or(Error::NonLinearIndexNotFound(kind))?;

            let fetch_k = if condition.is_some() {
                (n * OVER_FETCH_FACTOR).max(n).min(self.entries.len().max(n))
            } else {
                n
            };

            let mut guard = instance.lock();
            let results = guard.search(probe.as_slice(), fetch_k, ef)?;
            drop(guard);

            let mut out = Vec::with_capacity(n);
            for result in results {
                if out.len() >= n {
                    break;
                }
                let handle = result.id as Handle;
                let Some(entry) = self.entries.get(&handle) else {
                    continue;
                };
                if let Some(cond) = condition {
                    if !cond.matches(&entry.value) {
                        continue;
                    }
                }
                // Non-linear indexes already return the true, un-flipped
                // metric score (see `HnswIndex::search`/`KdTree::search`).
                out.push(((*entry.vector).clone(), entry.value.clone(), result.score));
            }
            Ok(out)
        }
    }

    pub fn del_key(&mut self, vectors: &[Vector]) -> Result<usize> {
        let mut count = 0;
        for vector in vectors {
            if let Some(handle) = self.by_vector.remove(vector) {
                let entry = self.entries.remove(&handle).unwrap();
                self.allocator.release(Self::entry_bytes(&entry.vector, &entry.value));
                self.size_bytes -= Self::entry_bytes(&entry.vector, &entry.value);
                self.predicate_index.remove(handle, &entry.value);
                for instance in self.non_linear.values() {
                    let _ = instance.lock().delete(handle);
                }
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn del_pred(&mut self, condition: &Condition) -> Result<usize> {
        let handles = self.resolve_condition(condition);
        let mut count = 0;
        for handle in handles {
            if let Some(entry) = self.entries.remove(&handle) {
                self.by_vector.remove(entry.vector.as_ref());
                self.allocator.release(Self::entry_bytes(&entry.vector, &entry.value));
                self.size_bytes -= Self::entry_bytes(&entry.vector, &entry.value);
                self.predicate_index.remove(handle, &entry.value);
                for instance in self.non_linear.values() {
                    let _ = instance.lock().delete(handle);
                }
                count += 1;
            }
        }
        Ok(count)
    }

    /// Idempotent; backfills from the current primary map for fields that
    /// weren't already indexed.
    pub fn create_pred_index(&mut self, fields: &[String]) -> usize {
        let mut created = 0;
        for field in fields {
            if !self.predicate_index.is_indexed(field) {
                self.predicate_index.create_field(field);
                for (&handle, entry) in &self.entries {
                    self.predicate_index.insert(handle, &entry.value);
                }
                created += 1;
            }
        }
        created
    }

    pub fn drop_pred_index(&mut self, fields: &[String], error_if_not_exists: bool) -> Result<usize> {
        let mut dropped = 0;
        for field in fields {
            if self.predicate_index.is_indexed(field) {
                self.predicate_index.drop_field(field);
                dropped += 1;
            } else if error_if_not_exists {
                return Err(Error::PredicateFieldNotIndexed(field.clone()));
            }
        }
        Ok(dropped)
    }

    pub fn create_non_linear_index(&mut self, config: NonLinearIndexConfig) -> Result<usize> {
        let kind = config.kind();
        if self.non_linear.contains_key(&kind) {
            return Ok(0);
        }
        let mut instance = match config {
            NonLinearIndexConfig::KdTree(cfg) => NonLinearInstance::KdTree(KdTree::new(cfg)),
            NonLinearIndexConfig::Hnsw(cfg) => NonLinearInstance::Hnsw(HnswIndex::new(self.dimension, cfg)),
        };
        let mut handles: Vec<Handle> = self.entries.keys().copied().collect();
        handles.sort_unstable();
        for handle in handles {
            let entry = &self.entries[&handle];
            instance.insert(handle, (*entry.vector).clone())?;
        }
        self.non_linear.insert(kind, Mutex::new(instance));
        Ok(1)
    }

    pub fn drop_non_linear_index(&mut self, kind: NonLinearKind, error_if_not_exists: bool) -> Result<usize> {
        if self.non_linear.remove(&kind).is_some() {
            Ok(1)
        } else if error_if_not_exists {
            Err(Error::NonLinearIndexNotFound(kind))
        } else {
            Ok(0)
        }
    }

    pub fn info(&self, name: &str) -> StoreInfo {
        StoreInfo {
            name: name.to_string(),
            entry_count: self.entries.len(),
            size_bytes: self.size_bytes,
            predicate_fields: self.predicate_index.indexed_fields().cloned().collect(),
            non_linear_kinds: self.non_linear.keys().copied().collect(),
            dimension: self.dimension,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates every live `(vector, value)` pair, used by snapshot writes.
    pub fn iter_entries(&self) -> impl Iterator<Item = (&Vector, &StoreValue)> {
        self.entries.values().map(|e| (e.vector.as_ref(), &e.value))
    }

    pub fn predicate_fields(&self) -> Vec<String> {
        self.predicate_index.indexed_fields().cloned().collect()
    }

    pub fn non_linear_configs(&self) -> Vec<NonLinearIndexConfig> {
        self.non_linear.values().map(|m| m.lock().config()).collect()
    }

    pub fn hnsw_export(&self) -> Option<crate::index::hnsw::HnswSnapshot> {
        self.non_linear.get(&NonLinearKind::Hnsw).map(|m| {
            let guard = m.lock();
            match &*guard {
                NonLinearInstance::Hnsw(h) => h.export(),
                _ => unreachable!(),
            }
        })
    }

    pub fn kdtree_export_points(&self) -> Option<Vec<(u64, Vec<f32>)>> {
        self.non_linear.get(&NonLinearKind::KdTree).map(|m| {
            let guard = m.lock();
            match &*guard {
                NonLinearInstance::KdTree(t) => t.export_points(),
                _ => unreachable!(),
            }
        })
    }

    /// Replaces (or inserts) the HNSW index with an already-built instance,
    /// used when restoring from a snapshot.
    pub fn restore_hnsw(&mut self, index: HnswIndex) {
        self.non_linear
            .insert(NonLinearKind::Hnsw, Mutex::new(NonLinearInstance::Hnsw(index)));
    }

    /// Replaces (or inserts) the k-d tree index with an already-built
    /// instance, used when restoring from a snapshot.
    pub fn restore_kdtree(&mut self, tree: KdTree) {
        self.non_linear
            .insert(NonLinearKind::KdTree, Mutex::new(NonLinearInstance::KdTree(tree)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::hnsw::HnswConfig;
    use crate::index::kdtree::KdTreeConfig;

    fn allocator() -> Arc<BoundedAllocator> {
        Arc::new(BoundedAllocator::new(1024 * 1024 * 1024))
    }

    fn v(data: Vec<f32>) -> Vector {
        Vector::new(data).unwrap()
    }

    #[test]
    fn test_set_reports_inserted_then_updated() {
        let mut store = Store::new(2, &[], &[], allocator());
        let a = StoreValue::new().with_field("tag", "a");
        let r1 = store.set(vec![(v(vec![1.0, 0.0]), a.clone())]).unwrap();
        assert_eq!(r1, UpsertCount { inserted: 1, updated: 0 });
        let r2 = store.set(vec![(v(vec![1.0, 0.0]), a)]).unwrap();
        assert_eq!(r2, UpsertCount { inserted: 0, updated: 1 });
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_rejects_wrong_dimension() {
        let mut store = Store::new(3, &[], &[], allocator());
        let err = store
            .set(vec![(v(vec![1.0, 2.0]), StoreValue::new())])
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_get_key_only_found() {
        let mut store = Store::new(2, &[], &[], allocator());
        store.set(vec![(v(vec![1.0, 0.0]), StoreValue::new())]).unwrap();
        let found = store.get_key(&[v(vec![1.0, 0.0]), v(vec![0.0, 1.0])]);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_get_sim_n_cosine_ground_truth() {
        let mut store = Store::new(3, &[], &[], allocator());
        store
            .set(vec![
                (v(vec![1.0, 0.0, 0.0]), StoreValue::new().with_field("tag", "a")),
                (v(vec![0.0, 1.0, 0.0]), StoreValue::new().with_field("tag", "b")),
                (v(vec![0.0, 0.0, 1.0]), StoreValue::new().with_field("tag", "a")),
            ])
            .unwrap();

        let results = store
            .get_sim_n(&v(vec![1.0, 0.0, 0.0]), 2, SimilarityAlgorithm::Cosine, None, None)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, v(vec![1.0, 0.0, 0.0]));
        assert!((results[0].2 - 1.0).abs() < 1e-6);
        assert!(results[1].2.abs() < 1e-6);
    }

    #[test]
    fn test_get_sim_n_zero_n_errors() {
        let mut store = Store::new(2, &[], &[], allocator());
        store.set(vec![(v(vec![1.0, 0.0]), StoreValue::new())]).unwrap();
        let err = store
            .get_sim_n(&v(vec![1.0, 0.0]), 0, SimilarityAlgorithm::Euclidean, None, None)
            .unwrap_err();
        assert!(matches!(err, Error::ClosestNIsZero));
    }

    #[test]
    fn test_predicate_index_matches_scan() {
        let mut with_index = Store::new(2, &["tag".to_string()], &[], allocator());
        let mut without_index = Store::new(2, &[], &[], allocator());
        for store in [&mut with_index, &mut without_index] {
            store
                .set(vec![
                    (v(vec![1.0, 0.0]), StoreValue::new().with_field("tag", "a")),
                    (v(vec![0.0, 1.0]), StoreValue::new().with_field("tag", "b")),
                    (v(vec![1.0, 1.0]), StoreValue::new().with_field("tag", "a")),
                ])
                .unwrap();
        }

        let cond = Condition::equals("tag", "a");
        let mut a: Vec<_> = with_index.get_pred(&cond).into_iter().map(|(v, _)| v).collect();
        let mut b: Vec<_> = without_index.get_pred(&cond).into_iter().map(|(v, _)| v).collect();
        a.sort_by(|x, y| x.as_slice().partial_cmp(y.as_slice()).unwrap());
        b.sort_by(|x, y| x.as_slice().partial_cmp(y.as_slice()).unwrap());
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_del_pred_removes_from_primary_and_index() {
        let mut store = Store::new(2, &["tag".to_string()], &[], allocator());
        store
            .set(vec![
                (v(vec![1.0, 0.0]), StoreValue::new().with_field("tag", "a")),
                (v(vec![0.0, 1.0]), StoreValue::new().with_field("tag", "b")),
            ])
            .unwrap();
        let deleted = store.del_pred(&Condition::equals("tag", "a")).unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get_key(&[v(vec![1.0, 0.0])]).is_empty());
        assert!(store.get_pred(&Condition::equals("tag", "a")).is_empty());
    }

    #[test]
    fn test_index_subset_invariant_after_mixed_ops() {
        let mut store = Store::new(
            4,
            &["tag".to_string()],
            &[NonLinearIndexConfig::Hnsw(HnswConfig::with_m(4))],
            allocator(),
        );
        for i in 0..20u32 {
            let data: Vec<f32> = (0..4).map(|j| ((i + j) as f32).sin()).collect();
            store
                .set(vec![(v(data), StoreValue::new().with_field("tag", "x"))])
                .unwrap();
        }
        store.del_pred(&Condition::equals("tag", "x")).unwrap();
        assert_eq!(store.len(), 0);
        let err = store
            .get_sim_n(&v(vec![0.0, 0.0, 0.0, 0.0]), 1, SimilarityAlgorithm::Hnsw, None, None)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyGraph));
    }

    #[test]
    fn test_non_linear_index_error_when_missing() {
        let mut store = Store::new(2, &[], &[], allocator());
        store.set(vec![(v(vec![1.0, 0.0]), StoreValue::new())]).unwrap();
        let err = store
            .get_sim_n(&v(vec![1.0, 0.0]), 1, SimilarityAlgorithm::KdTree, None, None)
            .unwrap_err();
        assert!(matches!(err, Error::NonLinearIndexNotFound(NonLinearKind::KdTree)));
    }

    #[test]
    fn test_create_non_linear_index_backfills_existing_entries() {
        let mut store = Store::new(2, &[], &[], allocator());
        store.set(vec![(v(vec![1.0, 0.0]), StoreValue::new())]).unwrap();
        store.set(vec![(v(vec![0.0, 1.0]), StoreValue::new())]).unwrap();
        store
            .create_non_linear_index(NonLinearIndexConfig::KdTree(KdTreeConfig {
                dimension: 2,
                ..Default::default()
            }))
            .unwrap();
        let results = store
            .get_sim_n(&v(vec![1.0, 0.0]), 2, SimilarityAlgorithm::KdTree, None, None)
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_hnsw_cosine_score_sign_matches_linear_scan() {
        let mut store = Store::new(
            3,
            &[],
            &[NonLinearIndexConfig::Hnsw(HnswConfig {
                metric: crate::distance::LinearMetric::Cosine,
                ..HnswConfig::with_m(4)
            })],
            allocator(),
        );
        store
            .set(vec![
                (v(vec![1.0, 0.0, 0.0]), StoreValue::new()),
                (v(vec![0.0, 1.0, 0.0]), StoreValue::new()),
            ])
            .unwrap();

        let hnsw_results = store
            .get_sim_n(&v(vec![1.0, 0.0, 0.0]), 1, SimilarityAlgorithm::Hnsw, None, None)
            .unwrap();
        let linear_results = store
            .get_sim_n(&v(vec![1.0, 0.0, 0.0]), 1, SimilarityAlgorithm::Cosine, None, None)
            .unwrap();

        // Both paths rank the identical vector first with cosine score ~1.0,
        // not ~-1.0 - a sign inversion here would otherwise go unnoticed
        // since it doesn't change result ordering, only the reported score.
        assert!((hnsw_results[0].2 - 1.0).abs() < 1e-6);
        assert!((hnsw_results[0].2 - linear_results[0].2).abs() < 1e-6);
    }

    #[test]
    fn test_set_batch_leaves_no_state_when_allocator_rejects_it() {
        let one_entry_bytes = Store::entry_bytes(&v(vec![1.0, 0.0]), &StoreValue::new());
        let alloc = Arc::new(BoundedAllocator::new(one_entry_bytes));
        let mut store = Store::new(2, &[], &[], alloc.clone());

        let err = store
            .set(vec![
                (v(vec![1.0, 0.0]), StoreValue::new()),
                (v(vec![0.0, 1.0]), StoreValue::new()),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::AllocationCapacityOverflow));

        assert_eq!(store.len(), 0);
        assert_eq!(alloc.used(), 0);
        assert!(store.get_key(&[v(vec![1.0, 0.0]), v(vec![0.0, 1.0])]).is_empty());
    }

    #[test]
    fn test_allocator_accounting_on_drop() {
        let alloc = allocator();
        let mut store = Store::new(2, &[], &[], alloc.clone());
        store.set(vec![(v(vec![1.0, 0.0]), StoreValue::new())]).unwrap();
        let used_after_insert = alloc.used();
        assert!(used_after_insert > 0);
        store.del_key(&[v(vec![1.0, 0.0])]).unwrap();
        assert_eq!(alloc.used(), used_after_insert - super::Store::entry_bytes(&v(vec![1.0, 0.0]), &StoreValue::new()));
    }
}
