//! Pre-filter benchmark - comparing unfiltered vs metadata-filtered search.
//!
//! This example demonstrates how a predicate index narrows down the
//! candidate set with roaring-bitmap set operations before an HNSW index
//! is consulted at all, versus evaluating the condition only during the
//! non-linear traversal.

use lumendb::prelude::*;
use std::sync::Arc;
use std::time::Instant;

fn main() -> Result<()> {
    println!("pre-filter benchmark\n");

    let num_vectors = 10_000u32;
    let dimension = 64;
    let k = 10;

    println!("setup: {} vectors, {} dimensions\n", num_vectors, dimension);

    let categories = ["electronics", "books", "clothing", "sports", "home"];

    println!("generating {} vectors with metadata...", num_vectors);
    let allocator = Arc::new(limits::BoundedAllocator::new(u64::MAX));
    let config = NonLinearIndexConfig::Hnsw(HnswConfig::with_m(16));
    let mut store = Store::new(dimension, &["category".to_string()], &[config], allocator);

    let mut entries = Vec::with_capacity(num_vectors as usize);
    for i in 0..num_vectors {
        let v: Vec<f32> = (0..dimension).map(|j| ((i * dimension as u32 + j as u32) as f32).sin()).collect();
        let category = categories[(i as usize) % categories.len()];
        entries.push((Vector::new(v)?, StoreValue::new().with_field("category", category)));
    }
    store.set(entries)?;
    store.create_pred_index(&["category".to_string()]);
    println!("   store built, predicate index created\n");

    let query = Vector::new((0..dimension).map(|j| (j as f32 * 0.1).cos()).collect())?;
    let condition = Condition::equals("category", "electronics");

    let _ = store.get_sim_n(&query, k, SimilarityAlgorithm::Hnsw, Some(&condition), None)?;

    println!("filtered HNSW search (pre-filtered via roaring bitmap)...");
    let iterations = 100;
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = store.get_sim_n(&query, k, SimilarityAlgorithm::Hnsw, Some(&condition), None)?;
    }
    let filtered_time = start.elapsed() / iterations;

    println!("unfiltered HNSW search (baseline)...");
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = store.get_sim_n(&query, k, SimilarityAlgorithm::Hnsw, None, None)?;
    }
    let unfiltered_time = start.elapsed() / iterations;

    println!();
    println!("results (averaged over {} iterations):", iterations);
    println!("   unfiltered: {:?}", unfiltered_time);
    println!("   filtered:   {:?}", filtered_time);

    let matching = store.get_pred(&condition).len();
    println!();
    println!("filter stats:");
    println!("   total vectors:   {}", num_vectors);
    println!("   matching filter: {} ({:.1}%)", matching, matching as f64 / num_vectors as f64 * 100.0);
    println!();

    println!("predicate indexes make metadata-filtered search efficient.");
    Ok(())
}
