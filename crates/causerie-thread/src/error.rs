use thiserror::Error;

use causerie_node::NodeError;

/// Errors surfaced by the thread controller.
#[derive(Error, Debug)]
pub enum ThreadError {
    /// Storage/transport failure, passed through unchanged.
    #[error("Node layer error: {0}")]
    Node(#[from] NodeError),

    /// The view window lock was poisoned.
    #[error("View lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ThreadError>;
