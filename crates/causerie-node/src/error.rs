use thiserror::Error;

use causerie_shared::IdentityError;

/// Errors produced by the node/storage layer.
#[derive(Error, Debug)]
pub enum NodeError {
    /// The addressed node does not exist (or was already destroyed).
    #[error("Node not found")]
    NotFound,

    /// A node failed signature verification at ingest.
    #[error("Node signature rejected: {0}")]
    Signature(#[from] IdentityError),

    /// Annotation blob (de)serialization failure.
    #[error("Annotation codec error: {0}")]
    AnnotationCodec(#[from] bincode::Error),

    /// Shared hub state lock was poisoned.
    #[error("Storage lock poisoned")]
    LockPoisoned,

    /// Generic storage failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NodeError>;
