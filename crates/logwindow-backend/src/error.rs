//! Error types for log service backends.

use thiserror::Error;

/// Errors returned by a page fetch.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The log group does not exist.
    #[error("log group not found: {0}")]
    GroupNotFound(String),

    /// The log stream does not exist in the group.
    #[error("log stream not found: {group}/{stream}")]
    StreamNotFound { group: String, stream: String },

    /// The continuation token was not issued by this backend.
    #[error("invalid continuation token: {0}")]
    InvalidToken(String),

    /// A request parameter was rejected.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A replay fixture could not be decoded.
    #[error("fixture error: {0}")]
    Fixture(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
