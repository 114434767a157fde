//! Error types for lumendb storage-engine operations.

use thiserror::Error;

/// Result type alias using lumendb's `Error` type.
pub type Result<T> = std::result::Result<T, Error>;

/// The client-facing error category, attached to every [`Error`] via
/// [`Error::category`]. The wire layer uses this to pick a response status
/// without pattern-matching the full variant list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    ResourceExhausted,
    FailedPrecondition,
    Internal,
}

/// Errors that can occur during lumendb operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("store not found: {0}")]
    StoreNotFound(String),

    #[error("predicate field not indexed: {0}")]
    PredicateFieldNotIndexed(String),

    #[error("non-linear index not found: {0:?}")]
    NonLinearIndexNotFound(crate::index::NonLinearKind),

    #[error("store already exists: {0}")]
    StoreAlreadyExists(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("empty vector not allowed")]
    EmptyVector,

    #[error("vector has a non-finite component")]
    NonFiniteComponent,

    #[error("n (closest-N) must be greater than zero")]
    ClosestNIsZero,

    #[error("store dimension must be greater than zero, got {0}")]
    InvalidDimension(usize),

    #[error("invalid predicate type for field {0}")]
    InvalidPredicateType(String),

    #[error("allocator capacity exceeded")]
    AllocationCapacityOverflow,

    #[error("message exceeds the configured size limit")]
    MessageTooLarge,

    #[error("maximum number of clients reached")]
    TooManyClients,

    #[error("protocol major version mismatch: server={server_major}, client={client_major}")]
    ProtocolMajorMismatch { server_major: u32, client_major: u32 },

    #[error("failed to load persisted snapshot at startup")]
    PersistLoadFailed,

    #[error("failed to write snapshot: {0}")]
    SnapshotWriteFailed(String),

    #[error("snapshot data is corrupted: {0}")]
    IndexCorrupted(String),

    #[error("unknown HNSW node id: {0}")]
    UnknownNodeId(u64),

    #[error("HNSW graph is empty")]
    EmptyGraph,

    #[error("i/o error: {0}")]
    Io(String),
}

impl Error {
    /// The taxonomy bucket this error falls into.
    pub fn category(&self) -> ErrorCategory {
        use Error::*;
        match self {
            StoreNotFound(_) | PredicateFieldNotIndexed(_) | NonLinearIndexNotFound(_) => {
                ErrorCategory::NotFound
            }
            StoreAlreadyExists(_) => ErrorCategory::AlreadyExists,
            DimensionMismatch { .. }
            | EmptyVector
            | NonFiniteComponent
            | ClosestNIsZero
            | InvalidDimension(_)
            | InvalidPredicateType(_) => ErrorCategory::InvalidArgument,
            AllocationCapacityOverflow | MessageTooLarge | TooManyClients => {
                ErrorCategory::ResourceExhausted
            }
            ProtocolMajorMismatch { .. } | PersistLoadFailed => ErrorCategory::FailedPrecondition,
            SnapshotWriteFailed(_) | IndexCorrupted(_) | UnknownNodeId(_) | EmptyGraph | Io(_) => {
                ErrorCategory::Internal
            }
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
