//! Shared types for logwindow
//!
//! This crate contains the event records, paging markers and result
//! containers used across the logwindow crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Largest window `head`/`tail` may request (the log service's page cap)
pub const MAX_WINDOW: usize = 10_000;

// ============================================================================
// Event Types
// ============================================================================

/// A single log line read from one stream
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub message: String,

    /// Event time in milliseconds since the epoch
    pub timestamp: i64,

    /// Time the service accepted the event, milliseconds since the epoch
    pub ingestion_time: i64,
}

impl LogEvent {
    pub fn new(message: impl Into<String>, timestamp: i64, ingestion_time: i64) -> Self {
        Self {
            message: message.into(),
            timestamp,
            ingestion_time,
        }
    }

    /// Event time as a UTC datetime (None if out of range)
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A log line returned by a cross-stream search, tagged with its stream
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilterEvent {
    pub message: String,
    pub timestamp: i64,
    pub ingestion_time: i64,

    /// Stream the event was read from (empty for static text)
    #[serde(rename = "logStreamName")]
    pub stream_name: String,

    /// Opaque backend id, or the line ordinal for static text
    pub event_id: String,
}

impl LogFilterEvent {
    /// Event time as a UTC datetime (None if out of range)
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

impl fmt::Display for LogFilterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ============================================================================
// Paging Types
// ============================================================================

/// Opaque handle handed back to the backend to fetch the next page
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for ContinuationToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContinuationToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One element of a page sequence
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Page<E> {
    /// Events returned by a single fetch, in traversal order
    Events(Vec<E>),

    /// No new data yet; only produced while following
    Idle,
}

impl<E> Page<E> {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Events carried by this page (empty for the idle marker)
    pub fn into_events(self) -> Vec<E> {
        match self {
            Self::Events(events) => events,
            Self::Idle => Vec::new(),
        }
    }
}

/// Where a stream walk begins
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Origin {
    /// Oldest record first
    #[default]
    Head,
    /// Newest record first
    Tail,
}

impl Origin {
    pub fn is_head(&self) -> bool {
        matches!(self, Self::Head)
    }
}

/// Scope of a cross-stream search: exactly one of an explicit set of
/// stream names or a stream name prefix
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamSelector {
    ByNames(Vec<String>),
    ByPrefix(String),
}

impl StreamSelector {
    pub fn names(&self) -> Option<&[String]> {
        match self {
            Self::ByNames(names) => Some(names),
            Self::ByPrefix(_) => None,
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        match self {
            Self::ByNames(_) => None,
            Self::ByPrefix(prefix) => Some(prefix),
        }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Values grouped by stream name, keeping first-seen order of both the
/// stream names and the values within each stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamGroups<T> {
    groups: Vec<(String, Vec<T>)>,
    index: HashMap<String, usize>,
}

impl<T> StreamGroups<T> {
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Append a value to the group for `stream_name`, creating it if new
    pub fn push(&mut self, stream_name: &str, value: T) {
        match self.index.get(stream_name) {
            Some(&i) => self.groups[i].1.push(value),
            None => {
                self.index.insert(stream_name.to_string(), self.groups.len());
                self.groups.push((stream_name.to_string(), vec![value]));
            }
        }
    }

    pub fn get(&self, stream_name: &str) -> Option<&[T]> {
        self.index
            .get(stream_name)
            .map(|&i| self.groups[i].1.as_slice())
    }

    /// Iterate groups in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.groups
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(name, _)| name.as_str())
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of values across all groups
    pub fn total(&self) -> usize {
        self.groups.iter().map(|(_, values)| values.len()).sum()
    }
}

impl<T> Default for StreamGroups<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntoIterator for StreamGroups<T> {
    type Item = (String, Vec<T>);
    type IntoIter = std::vec::IntoIter<(String, Vec<T>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}
