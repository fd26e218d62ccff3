//! Log service backend for logwindow
//!
//! This crate defines the two-operation contract the paging engine consumes,
//! the request and response shapes exchanged with a log service, and an
//! in-memory backend used for replaying recorded log groups.

mod error;
mod memory;
mod pattern;
mod request;

use std::future::Future;

pub use error::{BackendError, Result};
pub use memory::{MemoryBackend, RecordedRequest};
pub use pattern::FilterPattern;
pub use request::{
    FilterLogEventsRequest, FilterLogEventsResponse, GetLogEventsRequest, GetLogEventsResponse,
};

// Re-export types used in our public API
pub use logwindow_types::{ContinuationToken, LogEvent, LogFilterEvent, StreamSelector};

/// A log service that can return one page of events per call.
///
/// Implementations own transport concerns such as retries and credentials;
/// any error they return terminates the operation that issued the call.
pub trait LogBackend {
    /// Fetch one page of a single stream.
    fn get_log_events(
        &self,
        request: GetLogEventsRequest,
    ) -> impl Future<Output = Result<GetLogEventsResponse>> + Send;

    /// Fetch one page of events matching a filter pattern across streams.
    fn filter_log_events(
        &self,
        request: FilterLogEventsRequest,
    ) -> impl Future<Output = Result<FilterLogEventsResponse>> + Send;
}
