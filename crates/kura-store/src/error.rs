//! Store error types.

use thiserror::Error;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Commit failed because another transaction wrote a conflicting key.
    /// Retryable by the caller.
    #[error("transaction conflict")]
    Conflict,

    /// No directory registered at the given path.
    #[error("directory not found: /{0}")]
    NotFound(String),

    /// A directory is already registered at the given path.
    #[error("directory already exists: /{0}")]
    AlreadyExists(String),

    /// A key or value failed to decode.
    #[error("malformed key or value: {0}")]
    Codec(String),

    /// A path segment contains bytes the key encoding cannot represent.
    #[error("invalid path segment: {0:?}")]
    InvalidSegment(String),
}

impl StoreError {
    /// Create a NotFound error from path segments.
    pub fn not_found(path: &[String]) -> Self {
        Self::NotFound(path.join("/"))
    }

    /// Create an AlreadyExists error from path segments.
    pub fn already_exists(path: &[String]) -> Self {
        Self::AlreadyExists(path.join("/"))
    }

    /// Create a Codec error.
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
