//! Request and response shapes exchanged with a log service.
//!
//! Optional parameters the caller leaves unset are omitted from the
//! serialized request entirely; the service rejects explicit nulls.

use serde::{Deserialize, Serialize};

use logwindow_types::{ContinuationToken, LogEvent, LogFilterEvent, StreamSelector};

/// Read one page of a single stream
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLogEventsRequest {
    pub log_group_name: String,
    pub log_stream_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<ContinuationToken>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_from_head: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl GetLogEventsRequest {
    pub fn new(group: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            log_group_name: group.into(),
            log_stream_name: stream.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: Option<ContinuationToken>) -> Self {
        self.next_token = token;
        self
    }

    pub fn with_start_from_head(mut self, start_from_head: bool) -> Self {
        self.start_from_head = Some(start_from_head);
        self
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }
}

/// One page of a single stream
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLogEventsResponse {
    /// Events in ascending timestamp order
    #[serde(default)]
    pub events: Vec<LogEvent>,

    /// Token for the page after this one; equals the submitted token when
    /// there is nothing newer
    pub next_forward_token: Option<ContinuationToken>,

    /// Token for the page before this one; equals the submitted token when
    /// there is nothing older
    pub next_backward_token: Option<ContinuationToken>,
}

/// Search a group for events matching a filter pattern
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterLogEventsRequest {
    pub log_group_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_stream_names: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_stream_name_prefix: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_pattern: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<ContinuationToken>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl FilterLogEventsRequest {
    /// Build a request scoped by exactly one of names or prefix
    pub fn new(group: impl Into<String>, selector: &StreamSelector) -> Self {
        Self {
            log_group_name: group.into(),
            log_stream_names: selector.names().map(|names| names.to_vec()),
            log_stream_name_prefix: selector.prefix().map(str::to_string),
            ..Default::default()
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.filter_pattern = Some(pattern.into());
        self
    }

    pub fn with_token(mut self, token: Option<ContinuationToken>) -> Self {
        self.next_token = token;
        self
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }
}

/// One page of a cross-stream search
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterLogEventsResponse {
    #[serde(default)]
    pub events: Vec<LogFilterEvent>,

    /// Present only while more pages remain
    pub next_token: Option<ContinuationToken>,
}
