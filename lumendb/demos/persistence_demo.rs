//! Persistence demonstration for lumendb.
//!
//! This example shows how to:
//! 1. Create a catalog with a store and insert vectors
//! 2. Save a snapshot to disk
//! 3. Load that snapshot into a fresh catalog (simulating a restart)
//! 4. Verify the data and indexes survived the round trip

use lumendb::prelude::*;
use lumendb_core::snapshot;
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let snapshot_path = Path::new("./demo_snapshot.lumendb");
    let _ = fs::remove_file(snapshot_path);

    println!("lumendb persistence demo\n");

    println!("phase 1: creating a store and inserting vectors...");
    {
        let allocator = Arc::new(limits::BoundedAllocator::new(16 * 1024 * 1024));
        let catalog = Catalog::new(allocator);
        catalog.create_store(
            "documents",
            8,
            &["title".to_string()],
            &[NonLinearIndexConfig::Hnsw(HnswConfig::with_m(16))],
            true,
        )?;

        let docs = vec![
            (1u64, "Rust programming basics", [0.9, 0.8, 0.1, 0.0, 0.1, 0.0, 0.2, 0.1]),
            (2, "Advanced Rust patterns", [0.85, 0.9, 0.15, 0.05, 0.1, 0.0, 0.25, 0.15]),
            (3, "Python data science", [0.1, 0.2, 0.9, 0.85, 0.0, 0.1, 0.0, 0.2]),
            (4, "Machine learning", [0.2, 0.1, 0.7, 0.8, 0.6, 0.7, 0.1, 0.3]),
            (5, "Systems with Rust", [0.8, 0.7, 0.2, 0.1, 0.15, 0.05, 0.3, 0.2]),
        ];

        catalog.with_store_write("documents", |store| {
            let entries = docs
                .iter()
                .map(|(id, title, v)| {
                    (Vector::new(v.to_vec()).unwrap(), StoreValue::new().with_field("title", *title).with_field("id", id.to_string()))
                })
                .collect();
            store.set(entries)
        })?;

        println!("   inserted 5 vectors");
        println!("   writing snapshot to disk...");
        snapshot::save(&catalog, snapshot_path)?;
        println!("   snapshot written\n");
    }

    println!("phase 2: loading snapshot into a fresh catalog...");
    {
        let allocator = Arc::new(limits::BoundedAllocator::new(16 * 1024 * 1024));
        let catalog = Catalog::new(allocator);
        snapshot::load(&catalog, snapshot_path)?;

        let stores = catalog.list_stores();
        println!("   catalog restored with {} store(s)", stores.len());
        for info in &stores {
            println!("   store {:?}: {} entries", info.name, info.entry_count);
        }
        println!();

        println!("searching restored HNSW index for 'Rust programming'...");
        let query = Vector::new(vec![0.88, 0.85, 0.12, 0.03, 0.12, 0.02, 0.22, 0.12])?;
        let results = catalog.with_store_read("documents", |store| {
            store.get_sim_n(&query, 3, SimilarityAlgorithm::Hnsw, None, None)
        })?;

        println!("top 3 results:");
        for (_, value, score) in &results {
            let title = value.get("title").and_then(|v| v.as_str()).unwrap_or("unknown");
            println!("   {} (score: {:.4})", title, score);
        }
        println!();
    }

    let _ = fs::remove_file(snapshot_path);
    println!("demo complete, lumendb persistence is working correctly.");
    Ok(())
}
