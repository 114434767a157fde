use std::sync::Arc;

use lumendb_core::distance::{cosine_similarity, dot_product_similarity, euclidean_distance_squared};
use lumendb_core::index::hnsw::HnswConfig;
use lumendb_core::index::NonLinearIndexConfig;
use lumendb_core::limits::BoundedAllocator;
use lumendb_core::{SimilarityAlgorithm, Store, StoreValue, Vector};
use proptest::prelude::*;

const DIM: usize = 4;

fn allocator() -> Arc<BoundedAllocator> {
    Arc::new(BoundedAllocator::new(u64::MAX))
}

/// A small, finite-component vector strategy so generated floats never
/// collide with the reserved non-finite sentinels `Vector::new` rejects.
fn vector_strategy() -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-100.0f32..100.0f32, DIM)
}

fn build_hnsw_store(seed: u64, vectors: &[Vec<f32>]) -> Store {
    let config = HnswConfig { seed, ..HnswConfig::with_m(6) };
    let mut store = Store::new(DIM, &[], &[NonLinearIndexConfig::Hnsw(config)], allocator());
    for v in vectors {
        store.set(vec![(Vector::new(v.clone()).unwrap(), StoreValue::new())]).unwrap();
    }
    store
}

proptest! {
    #[test]
    fn test_dot_product_matches_naive(
        a in proptest::collection::vec(-1.0f32..1.0f32, 0..100),
        b in proptest::collection::vec(-1.0f32..1.0f32, 0..100)
    ) {
        let len = std::cmp::min(a.len(), b.len());
        let a = &a[..len];
        let b = &b[..len];

        let optim = dot_product_similarity(a, b);
        let naive: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();

        prop_assert!((optim - naive).abs() < 1e-4);
    }

    #[test]
    fn test_euclidean_squared_matches_naive(
        a in proptest::collection::vec(-1.0f32..1.0f32, 0..100),
        b in proptest::collection::vec(-1.0f32..1.0f32, 0..100)
    ) {
        let len = std::cmp::min(a.len(), b.len());
        let a = &a[..len];
        let b = &b[..len];

        let optim = euclidean_distance_squared(a, b);

        let naive: f32 = a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let diff = x - y;
                diff * diff
            })
            .sum();

        prop_assert!((optim - naive).abs() < 1e-3);
    }

    #[test]
    fn test_cosine_matches_naive(
        a in proptest::collection::vec(-1.0f32..1.0f32, 0..100),
        b in proptest::collection::vec(-1.0f32..1.0f32, 0..100)
    ) {
        let len = std::cmp::min(a.len(), b.len());
        let a = &a[..len];
        let b = &b[..len];

        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        // Zero-norm vectors are a defined edge case (result 0.0), not skipped.
        if norm_a * norm_b == 0.0 {
            prop_assert_eq!(cosine_similarity(a, b), 0.0);
            return Ok(());
        }

        let optim = cosine_similarity(a, b);
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let naive = dot / (norm_a * norm_b);

        prop_assert!((optim - naive).abs() < 1e-4);
    }

    /// Invariant 1 (`index subset`): after any mixed sequence of inserts and
    /// deletes, every vector that still appears in the HNSW graph is also
    /// retrievable from the store's primary map.
    #[test]
    fn test_hnsw_index_subset_invariant(
        vectors in proptest::collection::vec(vector_strategy(), 1..40),
        delete_mask in proptest::collection::vec(any::<bool>(), 1..40),
    ) {
        let mut store = build_hnsw_store(42, &vectors);

        for (v, &should_delete) in vectors.iter().zip(delete_mask.iter()) {
            if should_delete {
                let _ = store.del_key(&[Vector::new(v.clone()).unwrap()]);
            }
        }

        if let Some(snapshot) = store.hnsw_export() {
            for node in &snapshot.nodes {
                let probe = Vector::new(node.vector.clone()).unwrap();
                let found = store.get_key(std::slice::from_ref(&probe));
                prop_assert!(
                    !found.is_empty(),
                    "HNSW node {} references a vector absent from the primary map",
                    node.id
                );
            }
        }
    }

    /// Invariant 3 (`upsert idempotence`): re-`Set`-ting the same vector
    /// reports `inserted` then `updated`, and the store's length grows by
    /// exactly one regardless of how many times it's repeated afterward.
    #[test]
    fn test_upsert_idempotence(
        vector in vector_strategy(),
        tags in proptest::collection::vec("[a-z]{1,8}", 1..5),
    ) {
        let mut store = Store::new(DIM, &[], &[], allocator());
        let v = Vector::new(vector).unwrap();

        let first = store
            .set(vec![(v.clone(), StoreValue::new().with_field("tag", tags[0].clone()))])
            .unwrap();
        prop_assert_eq!(first.inserted, 1);
        prop_assert_eq!(first.updated, 0);
        prop_assert_eq!(store.len(), 1);

        for tag in &tags[1..] {
            let result = store
                .set(vec![(v.clone(), StoreValue::new().with_field("tag", tag.clone()))])
                .unwrap();
            prop_assert_eq!(result.inserted, 0);
            prop_assert_eq!(result.updated, 1);
            prop_assert_eq!(store.len(), 1);
        }
    }

    /// Invariant 7 (`HNSW determinism`): for a fixed seed and identical
    /// insertion order, two independently built graphs have bit-identical
    /// adjacency at every layer, the same entry point, and the same top
    /// level.
    #[test]
    fn test_hnsw_determinism_under_random_insertion_sequences(
        vectors in proptest::collection::vec(vector_strategy(), 1..30),
        seed in any::<u64>(),
    ) {
        let a = build_hnsw_store(seed, &vectors).hnsw_export().unwrap();
        let b = build_hnsw_store(seed, &vectors).hnsw_export().unwrap();

        prop_assert_eq!(a.entry_point, b.entry_point);
        prop_assert_eq!(a.top_level, b.top_level);

        let mut nodes_a = a.nodes.clone();
        let mut nodes_b = b.nodes.clone();
        nodes_a.sort_by_key(|n| n.id);
        nodes_b.sort_by_key(|n| n.id);
        for (na, nb) in nodes_a.iter().zip(nodes_b.iter()) {
            prop_assert_eq!(na.id, nb.id);
            prop_assert_eq!(na.level, nb.level);
            prop_assert_eq!(&na.neighbors, &nb.neighbors);
        }
    }

    /// Invariant 5 (`similarity ground truth`): for a small store, `GetSimN`
    /// under `Cosine` returns exactly the brute-force top-N, ranked in the
    /// same order.
    #[test]
    fn test_get_sim_n_cosine_matches_brute_force(
        vectors in proptest::collection::vec(vector_strategy(), 2..15),
        probe in vector_strategy(),
        n in 1usize..8,
    ) {
        let mut store = Store::new(DIM, &[], &[], allocator());
        let mut unique = Vec::new();
        for v in &vectors {
            if store
                .set(vec![(Vector::new(v.clone()).unwrap(), StoreValue::new())])
                .unwrap()
                .inserted
                == 1
            {
                unique.push(v.clone());
            }
        }
        let probe_vector = Vector::new(probe.clone()).unwrap();
        let n = n.min(unique.len());
        prop_assume!(n > 0);

        let results = store
            .get_sim_n(&probe_vector, n, SimilarityAlgorithm::Cosine, None, None)
            .unwrap();

        let mut brute: Vec<(usize, f32)> = unique
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(&probe, v)))
            .collect();
        brute.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));

        prop_assert_eq!(results.len(), n);
        for (result, expected) in results.iter().zip(brute.iter().take(n)) {
            prop_assert!((result.2 - expected.1).abs() < 1e-4);
        }
    }
}
