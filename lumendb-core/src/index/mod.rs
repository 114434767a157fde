//! Non-linear approximate nearest-neighbor indexes: HNSW and a k-d tree.

pub mod hnsw;
pub mod kdtree;

use serde::{Deserialize, Serialize};

/// Which non-linear index kind a `CreateNonLinearIndex`/`DropNonLinearIndex`
/// request (or a `GetSimN` algorithm selector) refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NonLinearKind {
    KdTree,
    Hnsw,
}

/// Per-kind construction parameters, as supplied to `CreateNonLinearIndex`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NonLinearIndexConfig {
    KdTree(kdtree::KdTreeConfig),
    Hnsw(hnsw::HnswConfig),
}

impl NonLinearIndexConfig {
    pub fn kind(&self) -> NonLinearKind {
        match self {
            NonLinearIndexConfig::KdTree(_) => NonLinearKind::KdTree,
            NonLinearIndexConfig::Hnsw(_) => NonLinearKind::Hnsw,
        }
    }
}

/// A single scored result returned by a non-linear index search, before it
/// is joined back against the store's primary map for metadata. `id` is the
/// store-assigned handle also used as the HNSW node id / k-d tree point id.
#[derive(Debug, Clone)]
pub struct IndexSearchResult {
    pub id: u64,
    pub score: f32,
}

pub use hnsw::HnswConfig;
pub use kdtree::KdTreeConfig;
