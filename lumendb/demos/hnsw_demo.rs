//! HNSW demo - comparing linear brute-force vs HNSW search performance.
//!
//! This example demonstrates how an HNSW index provides fast approximate
//! nearest neighbor search compared to linear exact search.

use lumendb::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

fn main() -> Result<()> {
    println!("HNSW performance demo\n");

    let num_vectors = 10_000u32;
    let dimension = 128;
    let k = 10;

    println!("setup: {} vectors, {} dimensions\n", num_vectors, dimension);

    println!("generating {} vectors...", num_vectors);
    let vectors: Vec<Vec<f32>> = (0..num_vectors)
        .map(|i| (0..dimension).map(|j| ((i * dimension as u32 + j as u32) as f32 * 0.1).sin()).collect())
        .collect();

    println!("building a linear-only store...");
    let allocator = Arc::new(limits::BoundedAllocator::new(u64::MAX));
    let mut linear_store = Store::new(dimension, &[], &[], allocator.clone());
    let start = Instant::now();
    for (i, v) in vectors.iter().enumerate() {
        linear_store.set(vec![(Vector::new(v.clone())?, StoreValue::new().with_field("id", i.to_string()))])?;
    }
    println!("   built in {:?}", start.elapsed());

    println!("building an HNSW-indexed store...");
    let config = NonLinearIndexConfig::Hnsw(HnswConfig::with_m(16));
    let mut hnsw_store = Store::new(dimension, &[], &[config], allocator);
    let start = Instant::now();
    for (i, v) in vectors.iter().enumerate() {
        hnsw_store.set(vec![(Vector::new(v.clone())?, StoreValue::new().with_field("id", i.to_string()))])?;
    }
    println!("   built in {:?}\n", start.elapsed());

    let query = Vector::new((0..dimension).map(|j| (j as f32 * 0.15).cos()).collect())?;

    println!("linear search (exact k={})...", k);
    let start = Instant::now();
    let linear_results = linear_store.get_sim_n(&query, k, SimilarityAlgorithm::Euclidean, None, None)?;
    let linear_time = start.elapsed();
    println!("   time: {:?}", linear_time);

    println!("HNSW search (approximate k={})...", k);
    let start = Instant::now();
    let hnsw_results = hnsw_store.get_sim_n(&query, k, SimilarityAlgorithm::Hnsw, None, None)?;
    let hnsw_time = start.elapsed();
    println!("   time: {:?}\n", hnsw_time);

    let linear_ids: HashSet<_> = linear_results.iter().map(|(v, _, _)| v.fingerprint()).collect();
    let hnsw_ids: HashSet<_> = hnsw_results.iter().map(|(v, _, _)| v.fingerprint()).collect();
    let intersection = linear_ids.intersection(&hnsw_ids).count();
    let recall = intersection as f64 / k as f64;

    println!("results:");
    println!("   linear: {:?}", linear_time);
    println!("   HNSW:   {:?}", hnsw_time);
    println!("   speedup: {:.1}x", linear_time.as_nanos() as f64 / hnsw_time.as_nanos() as f64);
    println!("   recall@{}: {:.0}%\n", k, recall * 100.0);

    println!("HNSW provides fast approximate search with high recall.");
    Ok(())
}
