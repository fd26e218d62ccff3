//! Error types for log paging operations.

use logwindow_backend::BackendError;
use thiserror::Error;

/// Errors that terminate a paging operation.
#[derive(Debug, Error)]
pub enum LogError {
    /// A search was scoped by both stream names and a prefix, or by neither.
    #[error("invalid stream selector: {0}")]
    InvalidSelector(&'static str),

    /// A head or tail window larger than the service allows.
    #[error("window of {requested} events exceeds the maximum of {max}")]
    WindowTooLarge { requested: usize, max: usize },

    /// The client-side regex did not compile.
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    /// A page fetch failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type alias for paging operations.
pub type Result<T> = std::result::Result<T, LogError>;
