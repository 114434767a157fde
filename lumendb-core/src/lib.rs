//! # lumendb-core
//!
//! Core library for lumendb — a pure-Rust embedded vector database.
//!
//! This crate provides the foundational components for vector storage,
//! predicate filtering, and similarity search. It is designed to be
//! lightweight and synchronous; the network-facing server binary owns the
//! runtime and threading model.
//!
//! ## Core Types
//!
//! ### Storage
//!
//! - [`Store`] - One named collection of fixed-dimension vectors and metadata
//! - [`Catalog`] - The process-wide `StoreName -> Store` registry
//!
//! ### Indexes
//!
//! - [`distance`] - Linear (brute-force) distance kernels: Euclidean, Dot, Cosine
//! - [`index::hnsw::HnswIndex`] - Approximate nearest neighbor via HNSW graphs
//! - [`index::kdtree::KdTree`] - Exact nearest neighbor via a lazily-rebuilt k-d tree
//! - [`predicate::bitmap_index::PredicateIndex`] - Roaring-bitmap index for metadata predicates
//!
//! ### Request handling
//!
//! - [`pipeline`] - Ordered, partial-failure batch request execution
//! - [`snapshot`] - Whole-catalog binary persistence
//! - [`limits`] - The bounded allocator and connection/message-size guards
//!
//! ### Types
//!
//! - [`Vector`] - Owned, fixed-dimension vector data
//! - [`metadata::StoreValue`] - A vector's attached metadata fields
//! - [`predicate::Condition`] - Declarative predicate expressions over metadata

pub mod catalog;
pub mod distance;
pub mod error;
pub mod index;
pub mod limits;
pub mod metadata;
pub mod pipeline;
pub mod predicate;
pub mod snapshot;
pub mod store;
pub mod vector;

pub use catalog::Catalog;
pub use distance::{LinearMetric, SimilarityAlgorithm};
pub use error::{Error, ErrorCategory, Result};
pub use index::{HnswConfig, KdTreeConfig, NonLinearIndexConfig, NonLinearKind};
pub use metadata::{MetadataValue, StoreValue};
pub use predicate::Condition;
pub use store::Store;
pub use vector::Vector;

/// Re-export commonly used types for convenience.
///
/// # Example
///
/// ```rust
/// use lumendb_core::prelude::*;
/// use std::sync::Arc;
///
/// let allocator = Arc::new(limits::BoundedAllocator::new(1024 * 1024));
/// let store = Store::new(3, &[], &[], allocator);
/// assert_eq!(store.dimension(), 3);
/// ```
pub mod prelude {
    pub use crate::{
        limits, Catalog, Condition, Error, HnswConfig, KdTreeConfig, LinearMetric, MetadataValue,
        NonLinearIndexConfig, NonLinearKind, Result, SimilarityAlgorithm, Store, StoreValue, Vector,
    };
}
