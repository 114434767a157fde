//! Quick start example for lumendb.
//!
//! This example demonstrates basic usage of lumendb for semantic search.

use lumendb::prelude::*;
use std::sync::Arc;

fn main() -> Result<()> {
    println!("lumendb quick start\n");

    let allocator = Arc::new(limits::BoundedAllocator::new(16 * 1024 * 1024));
    let mut store = Store::new(8, &["title".to_string()], &[], allocator);

    let documents = vec![
        (1u64, "Introduction to Rust programming", [0.9, 0.8, 0.1, 0.0, 0.1, 0.0, 0.2, 0.1]),
        (2, "Advanced Rust patterns and idioms", [0.85, 0.9, 0.15, 0.05, 0.1, 0.0, 0.25, 0.15]),
        (3, "Python for data science", [0.1, 0.2, 0.9, 0.85, 0.0, 0.1, 0.0, 0.2]),
        (4, "Machine learning fundamentals", [0.2, 0.1, 0.7, 0.8, 0.6, 0.7, 0.1, 0.3]),
        (5, "Systems programming with Rust", [0.8, 0.7, 0.2, 0.1, 0.15, 0.05, 0.3, 0.2]),
    ];

    println!("inserting {} documents...", documents.len());
    let entries = documents
        .iter()
        .map(|(id, title, embedding)| {
            let value = StoreValue::new().with_field("title", *title).with_field("id", id.to_string());
            (Vector::new(embedding.to_vec()).unwrap(), value)
        })
        .collect();
    store.set(entries)?;
    println!("store holds {} vectors\n", store.len());

    let query = Vector::new(vec![0.88, 0.85, 0.12, 0.03, 0.12, 0.02, 0.22, 0.12])?;
    println!("searching for documents similar to 'Rust programming'...\n");
    let results = store.get_sim_n(&query, 3, SimilarityAlgorithm::Cosine, None, None)?;

    println!("top 3 results:");
    println!("{:-<60}", "");
    for (rank, (_, value, score)) in results.iter().enumerate() {
        let title = value.get("title").and_then(|v| v.as_str()).unwrap_or("unknown");
        println!("  {}. {} (score: {:.4})", rank + 1, title, score);
    }
    println!("{:-<60}\n", "");

    println!("searching with a metadata filter (title = 'Systems programming with Rust')...\n");
    let condition = Condition::equals("title", "Systems programming with Rust");
    let filtered = store.get_sim_n(&query, 10, SimilarityAlgorithm::Cosine, Some(&condition), None)?;

    println!("filtered results:");
    println!("{:-<60}", "");
    for (_, value, score) in &filtered {
        let title = value.get("title").and_then(|v| v.as_str()).unwrap_or("unknown");
        println!("  {} (score: {:.4})", title, score);
    }
    println!("{:-<60}\n", "");

    println!("done, lumendb is working correctly.");
    Ok(())
}
