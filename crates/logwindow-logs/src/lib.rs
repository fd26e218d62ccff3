//! Log paging for logwindow
//!
//! This crate turns page-at-a-time log backends into lazy event streams:
//! bounded windows (head, tail), full history (cat), live tailing (follow),
//! and stream-grouped searches (filter, match, find).

mod error;
mod query;
mod stream;

pub use error::{LogError, Result};
pub use query::{FilterSource, QuerySource, TextSource};
pub use stream::{FollowOptions, StreamSource, DEFAULT_FOLLOW_INTERVAL_SECS};

// Re-export types used in our public API
pub use logwindow_types::{
    LogEvent, LogFilterEvent, Origin, Page, StreamGroups, StreamSelector, MAX_WINDOW,
};
