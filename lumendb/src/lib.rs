//! # lumendb
//!
//! **An embedded vector database for local AI and RAG workloads.**
//!
//! lumendb provides fast, in-process vector similarity search optimized for:
//!
//! - **RAG applications** — Semantic retrieval for LLM context
//! - **Semantic search** — Find similar documents, images, or audio
//! - **Recommendations** — Content-based filtering with embeddings
//! - **Edge AI** — Local inference without cloud dependencies
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | **Linear kernels** | Euclidean, Dot, and Cosine brute-force scoring |
//! | **Non-linear indexes** | HNSW (approximate) and k-d tree (exact) |
//! | **Predicate filtering** | Combine similarity with metadata conditions |
//! | **Persistence** | Snapshot-based durability, loaded at startup |
//! | **Batch pipeline** | Ordered, partial-failure multi-request execution |
//!
//! ## Quick Start
//!
//! ```rust
//! use lumendb::prelude::*;
//! use std::sync::Arc;
//!
//! let allocator = Arc::new(limits::BoundedAllocator::new(64 * 1024 * 1024));
//! let mut store = Store::new(3, &[], &[], allocator);
//!
//! store
//!     .set(vec![(Vector::new(vec![0.1, 0.1, 0.1]).unwrap(), StoreValue::new())])
//!     .unwrap();
//!
//! let results = store
//!     .get_sim_n(&Vector::new(vec![0.1, 0.1, 0.1]).unwrap(), 10, SimilarityAlgorithm::Cosine, None, None)
//!     .unwrap();
//!
//! assert!(!results.is_empty());
//! ```
//!
//! ### Predicate filtering
//!
//! ```rust
//! use lumendb::prelude::*;
//! use std::sync::Arc;
//!
//! let allocator = Arc::new(limits::BoundedAllocator::new(64 * 1024 * 1024));
//! let mut store = Store::new(3, &["category".to_string()], &[], allocator);
//!
//! store.set(vec![
//!     (Vector::new(vec![1.0, 0.0, 0.0]).unwrap(), StoreValue::new().with_field("category", "A")),
//!     (Vector::new(vec![0.9, 0.1, 0.0]).unwrap(), StoreValue::new().with_field("category", "B")),
//!     (Vector::new(vec![0.8, 0.2, 0.0]).unwrap(), StoreValue::new().with_field("category", "A")),
//! ]).unwrap();
//!
//! let results = store.get_pred(&Condition::equals("category", "A"));
//! assert_eq!(results.len(), 2);
//! ```
//!
//! ### HNSW for large datasets
//!
//! ```rust
//! use lumendb::prelude::*;
//! use std::sync::Arc;
//!
//! let allocator = Arc::new(limits::BoundedAllocator::new(64 * 1024 * 1024));
//! let config = NonLinearIndexConfig::Hnsw(HnswConfig::with_m(16));
//! let mut store = Store::new(128, &[], &[config], allocator);
//!
//! for i in 0..1000u32 {
//!     let v: Vec<f32> = (0..128).map(|j| ((i * 128 + j) as f32).sin()).collect();
//!     store.set(vec![(Vector::new(v).unwrap(), StoreValue::new())]).unwrap();
//! }
//!
//! let query: Vec<f32> = (0..128).map(|j| (j as f32).cos()).collect();
//! let results = store
//!     .get_sim_n(&Vector::new(query).unwrap(), 10, SimilarityAlgorithm::Hnsw, None, None)
//!     .unwrap();
//! assert_eq!(results.len(), 10);
//! ```
//!
//! ## Architecture
//!
//! lumendb is organized into two crates:
//!
//! - **`lumendb-core`** — Core storage engine: stores, indexes, the request pipeline
//! - **`lumendb`** — This crate; re-exports everything from `lumendb-core`
//!
//! ### Core components
//!
//! - [`Store`] — One named collection of vectors and metadata
//! - [`Catalog`] — The process-wide registry of stores by name
//! - [`Condition`] — Metadata predicate expressions
//! - [`SimilarityAlgorithm`] — The linear and non-linear search selector
//!
//! ## Error handling
//!
//! All fallible operations return [`Result<T>`](crate::Result), which uses
//! the [`Error`] enum for error types.
//!
//! ## Thread safety
//!
//! [`Store`] exposes shared-vs-exclusive access via the methods its caller
//! chooses to call under a read or write lock; [`Catalog`] is the thing
//! that actually holds those locks and is safe to share across threads.

pub use lumendb_core::*;

pub mod prelude {
    pub use lumendb_core::prelude::*;
}
