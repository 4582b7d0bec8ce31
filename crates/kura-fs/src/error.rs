//! Filesystem error types.

use kura_store::StoreError;
use thiserror::Error;

/// Filesystem error type.
///
/// Store failures fold into this taxonomy at the component boundary:
/// commit conflicts stay distinguishable as [`FsError::Conflict`] so the
/// kernel bridge can surface them as transient, retryable failures.
#[derive(Debug, Error)]
pub enum FsError {
    /// Node (or one of its key ranges) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already names a node.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Permission mask evaluation failed.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Transaction commit lost to a concurrent modification. Retryable.
    #[error("transaction conflict")]
    Conflict,

    /// Stored metadata failed to decode.
    #[error("corrupt metadata: {0}")]
    Corrupt(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Malformed argument (reserved name, bad range, unknown descriptor).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The descriptor pool is exhausted.
    #[error("too many open files")]
    TooManyOpenFiles,

    /// A recursive move exceeded the single-transaction depth ceiling.
    #[error("move exceeds maximum depth {0}")]
    MoveTooDeep(usize),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl ToString) -> Self {
        Self::NotFound(path.to_string())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl ToString) -> Self {
        Self::AlreadyExists(path.to_string())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl ToString) -> Self {
        Self::PermissionDenied(path.to_string())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl ToString) -> Self {
        Self::NotADirectory(path.to_string())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl ToString) -> Self {
        Self::IsADirectory(path.to_string())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<StoreError> for FsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => FsError::Conflict,
            StoreError::NotFound(path) => FsError::NotFound(format!("/{path}")),
            StoreError::AlreadyExists(path) => FsError::AlreadyExists(format!("/{path}")),
            StoreError::Codec(msg) => FsError::Corrupt(msg),
            StoreError::InvalidSegment(segment) => {
                FsError::InvalidArgument(format!("invalid path segment: {segment:?}"))
            }
        }
    }
}

/// Filesystem result type.
pub type FsResult<T> = Result<T, FsError>;
