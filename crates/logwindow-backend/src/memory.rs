use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tracing::trace;

use logwindow_types::{ContinuationToken, LogEvent, LogFilterEvent, MAX_WINDOW};

use crate::error::{BackendError, Result};
use crate::pattern::FilterPattern;
use crate::request::{
    FilterLogEventsRequest, FilterLogEventsResponse, GetLogEventsRequest, GetLogEventsResponse,
};
use crate::LogBackend;

/// A request as it would have been sent over the wire
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    pub operation: &'static str,
    pub body: serde_json::Value,
}

/// Replay fixture describing one log group
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Fixture {
    group: String,
    #[serde(default)]
    streams: BTreeMap<String, Vec<LogEvent>>,
    page_size: Option<usize>,
}

/// In-memory log group with the paging behaviour of the live service.
///
/// Stream reads hand out forward and backward tokens that come back
/// unchanged once there is nothing further in that direction; searches hand
/// out a token only while more pages remain. Streams can be appended to
/// while a reader is following them.
pub struct MemoryBackend {
    group: String,
    streams: RwLock<BTreeMap<String, Vec<LogEvent>>>,

    /// Largest page returned regardless of the requested limit
    page_size: usize,

    requests: Mutex<Vec<RecordedRequest>>,
}

impl MemoryBackend {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            streams: RwLock::new(BTreeMap::new()),
            page_size: MAX_WINDOW,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Cap every page at `page_size` events
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_stream(self, name: impl Into<String>, events: Vec<LogEvent>) -> Self {
        self.streams.write().insert(name.into(), events);
        self
    }

    /// Load a log group from a JSON fixture
    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(json)?;
        let mut backend = Self::new(fixture.group);
        if let Some(page_size) = fixture.page_size {
            backend = backend.with_page_size(page_size);
        }
        *backend.streams.get_mut() = fixture.streams;
        Ok(backend)
    }

    /// Load a log group from a JSON fixture file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Append events to a stream, creating it if missing
    pub fn append(&self, stream: &str, events: impl IntoIterator<Item = LogEvent>) {
        self.streams
            .write()
            .entry(stream.to_string())
            .or_default()
            .extend(events);
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Stream names in the group, sorted
    pub fn stream_names(&self) -> Vec<String> {
        self.streams.read().keys().cloned().collect()
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn record<T: serde::Serialize>(&self, operation: &'static str, request: &T) -> Result<()> {
        let body = serde_json::to_value(request)?;
        self.requests.lock().push(RecordedRequest { operation, body });
        Ok(())
    }

    fn check_group(&self, group: &str) -> Result<()> {
        if group == self.group {
            Ok(())
        } else {
            Err(BackendError::GroupNotFound(group.to_string()))
        }
    }

    fn page_len(&self, limit: Option<u32>) -> Result<usize> {
        let limit = match limit {
            None => MAX_WINDOW,
            Some(0) => {
                return Err(BackendError::InvalidParameter {
                    name: "limit",
                    reason: "must be at least 1".to_string(),
                });
            }
            Some(n) if n as usize > MAX_WINDOW => {
                return Err(BackendError::InvalidParameter {
                    name: "limit",
                    reason: format!("must be at most {}", MAX_WINDOW),
                });
            }
            Some(n) => n as usize,
        };
        Ok(limit.min(self.page_size))
    }

    fn read_stream(&self, request: &GetLogEventsRequest) -> Result<GetLogEventsResponse> {
        self.check_group(&request.log_group_name)?;
        let take = self.page_len(request.limit)?;

        let streams = self.streams.read();
        let events = streams.get(&request.log_stream_name).ok_or_else(|| {
            BackendError::StreamNotFound {
                group: request.log_group_name.clone(),
                stream: request.log_stream_name.clone(),
            }
        })?;
        let len = events.len();

        let (start, end) = match &request.next_token {
            None if request.start_from_head.unwrap_or(false) => (0, take.min(len)),
            None => (len.saturating_sub(take), len),
            Some(token) => match StreamCursor::decode(token)? {
                StreamCursor::Forward(pos) => {
                    let pos = pos.min(len);
                    (pos, (pos + take).min(len))
                }
                StreamCursor::Backward(pos) => {
                    let pos = pos.min(len);
                    (pos.saturating_sub(take), pos)
                }
            },
        };

        Ok(GetLogEventsResponse {
            events: events[start..end].to_vec(),
            next_forward_token: Some(StreamCursor::Forward(end).encode()),
            next_backward_token: Some(StreamCursor::Backward(start).encode()),
        })
    }

    fn search(&self, request: &FilterLogEventsRequest) -> Result<FilterLogEventsResponse> {
        self.check_group(&request.log_group_name)?;
        let take = self.page_len(request.limit)?;

        if request.log_stream_names.is_some() && request.log_stream_name_prefix.is_some() {
            return Err(BackendError::InvalidParameter {
                name: "logStreamNames",
                reason: "cannot be combined with logStreamNamePrefix".to_string(),
            });
        }

        let streams = self.streams.read();
        if let Some(names) = &request.log_stream_names {
            if let Some(missing) = names.iter().find(|n| !streams.contains_key(n.as_str())) {
                return Err(BackendError::StreamNotFound {
                    group: request.log_group_name.clone(),
                    stream: missing.clone(),
                });
            }
        }

        let pattern = FilterPattern::parse(request.filter_pattern.as_deref().unwrap_or(""));
        let mut matched: Vec<LogFilterEvent> = streams
            .iter()
            .filter(|(name, _)| match (&request.log_stream_names, &request.log_stream_name_prefix) {
                (Some(names), _) => names.iter().any(|n| n == *name),
                (None, Some(prefix)) => name.starts_with(prefix.as_str()),
                (None, None) => true,
            })
            .flat_map(|(name, events)| {
                events.iter().enumerate().map(move |(idx, event)| LogFilterEvent {
                    message: event.message.clone(),
                    timestamp: event.timestamp,
                    ingestion_time: event.ingestion_time,
                    stream_name: name.clone(),
                    event_id: format!("{}/{}", name, idx),
                })
            })
            .filter(|event| pattern.matches(&event.message))
            .collect();
        matched.sort_by_key(|event| event.timestamp);

        let offset = match &request.next_token {
            None => 0,
            Some(token) => decode_offset(token)?,
        };
        let start = offset.min(matched.len());
        let end = (start + take).min(matched.len());
        let next_token = (end < matched.len()).then(|| encode_offset(end));

        Ok(FilterLogEventsResponse {
            events: matched.drain(start..end).collect(),
            next_token,
        })
    }
}

impl LogBackend for MemoryBackend {
    async fn get_log_events(&self, request: GetLogEventsRequest) -> Result<GetLogEventsResponse> {
        self.record("GetLogEvents", &request)?;
        let response = self.read_stream(&request)?;
        trace!(
            stream = %request.log_stream_name,
            events = response.events.len(),
            "served stream page"
        );
        Ok(response)
    }

    async fn filter_log_events(
        &self,
        request: FilterLogEventsRequest,
    ) -> Result<FilterLogEventsResponse> {
        self.record("FilterLogEvents", &request)?;
        let response = self.search(&request)?;
        trace!(
            events = response.events.len(),
            more = response.next_token.is_some(),
            "served search page"
        );
        Ok(response)
    }
}

/// Position between two events of a stream, plus the walk direction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamCursor {
    Forward(usize),
    Backward(usize),
}

impl StreamCursor {
    fn encode(self) -> ContinuationToken {
        match self {
            Self::Forward(pos) => ContinuationToken::new(format!("f/{}", pos)),
            Self::Backward(pos) => ContinuationToken::new(format!("b/{}", pos)),
        }
    }

    fn decode(token: &ContinuationToken) -> Result<Self> {
        let invalid = || BackendError::InvalidToken(token.to_string());
        let (dir, pos) = token.as_str().split_once('/').ok_or_else(invalid)?;
        let pos = pos.parse().map_err(|_| invalid())?;
        match dir {
            "f" => Ok(Self::Forward(pos)),
            "b" => Ok(Self::Backward(pos)),
            _ => Err(invalid()),
        }
    }
}

fn encode_offset(offset: usize) -> ContinuationToken {
    ContinuationToken::new(format!("s/{}", offset))
}

fn decode_offset(token: &ContinuationToken) -> Result<usize> {
    token
        .as_str()
        .strip_prefix("s/")
        .and_then(|offset| offset.parse().ok())
        .ok_or_else(|| BackendError::InvalidToken(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn numbered(count: usize) -> Vec<LogEvent> {
        (1..=count)
            .map(|i| LogEvent::new(format!("event {}", i), i as i64, i as i64))
            .collect()
    }

    fn messages(events: &[LogEvent]) -> Vec<&str> {
        events.iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn test_forward_walk_repeats_token_at_end() {
        let backend = MemoryBackend::new("g")
            .with_page_size(2)
            .with_stream("s", numbered(3));
        let first = block_on(
            backend.get_log_events(GetLogEventsRequest::new("g", "s").with_start_from_head(true)),
        )
        .unwrap();
        assert_eq!(messages(&first.events), vec!["event 1", "event 2"]);

        let token = first.next_forward_token.clone();
        let second =
            block_on(backend.get_log_events(GetLogEventsRequest::new("g", "s").with_token(token)))
                .unwrap();
        assert_eq!(messages(&second.events), vec!["event 3"]);

        let token = second.next_forward_token.clone();
        let third = block_on(
            backend.get_log_events(GetLogEventsRequest::new("g", "s").with_token(token.clone())),
        )
        .unwrap();
        assert!(third.events.is_empty());
        assert_eq!(third.next_forward_token, token);
    }

    #[test]
    fn test_backward_walk_from_tail() {
        let backend = MemoryBackend::new("g")
            .with_page_size(2)
            .with_stream("s", numbered(3));
        let first = block_on(
            backend.get_log_events(GetLogEventsRequest::new("g", "s").with_start_from_head(false)),
        )
        .unwrap();
        assert_eq!(messages(&first.events), vec!["event 2", "event 3"]);

        let token = first.next_backward_token.clone();
        let second =
            block_on(backend.get_log_events(GetLogEventsRequest::new("g", "s").with_token(token)))
                .unwrap();
        assert_eq!(messages(&second.events), vec!["event 1"]);
        assert_eq!(second.next_backward_token, Some("b/0".into()));
    }

    #[test]
    fn test_appended_events_reach_forward_token() {
        let backend = MemoryBackend::new("g").with_stream("s", numbered(1));
        let request = GetLogEventsRequest::new("g", "s").with_token(Some("f/1".into()));

        let idle = block_on(backend.get_log_events(request.clone())).unwrap();
        assert!(idle.events.is_empty());

        backend.append("s", [LogEvent::new("late", 9, 9)]);
        let fresh = block_on(backend.get_log_events(request)).unwrap();
        assert_eq!(messages(&fresh.events), vec!["late"]);
        assert_eq!(fresh.next_forward_token, Some("f/2".into()));
    }

    #[test]
    fn test_rejects_out_of_range_limit() {
        let backend = MemoryBackend::new("g").with_stream("s", numbered(1));
        let result = block_on(
            backend.get_log_events(GetLogEventsRequest::new("g", "s").with_limit(Some(0))),
        );
        assert!(matches!(
            result,
            Err(BackendError::InvalidParameter { name: "limit", .. })
        ));
    }

    #[test]
    fn test_search_pages_until_token_absent() {
        let backend = MemoryBackend::new("g")
            .with_page_size(2)
            .with_stream(
                "job/a",
                vec![LogEvent::new("ERROR a", 1, 1), LogEvent::new("ok", 3, 3)],
            )
            .with_stream(
                "job/b",
                vec![LogEvent::new("ERROR b", 2, 2), LogEvent::new("ERROR c", 4, 4)],
            )
            .with_stream("other", vec![LogEvent::new("ERROR z", 0, 0)]);
        let selector = logwindow_types::StreamSelector::ByPrefix("job/".to_string());
        let request = FilterLogEventsRequest::new("g", &selector).with_pattern("ERROR");

        let first = block_on(backend.filter_log_events(request.clone())).unwrap();
        let streams: Vec<_> = first.events.iter().map(|e| e.stream_name.as_str()).collect();
        assert_eq!(streams, vec!["job/a", "job/b"]);
        assert!(first.next_token.is_some());

        let second =
            block_on(backend.filter_log_events(request.with_token(first.next_token))).unwrap();
        assert_eq!(second.events.len(), 1);
        assert_eq!(second.events[0].message, "ERROR c");
        assert!(second.next_token.is_none());
    }

    #[test]
    fn test_unknown_stream() {
        let backend = MemoryBackend::new("g");
        let result = block_on(backend.get_log_events(GetLogEventsRequest::new("g", "missing")));
        assert!(matches!(result, Err(BackendError::StreamNotFound { .. })));

        let result = block_on(backend.get_log_events(GetLogEventsRequest::new("other", "s")));
        assert!(matches!(result, Err(BackendError::GroupNotFound(_))));
    }

    #[test]
    fn test_records_requests_without_unset_fields() {
        let backend = MemoryBackend::new("g").with_stream("s", numbered(1));
        block_on(backend.get_log_events(GetLogEventsRequest::new("g", "s"))).unwrap();

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].operation, "GetLogEvents");
        assert!(requests[0].body.get("limit").is_none());
        assert!(requests[0].body.get("nextToken").is_none());
    }

    #[test]
    fn test_load_fixture() {
        let json = r#"{
            "group": "/aws/sagemaker/TrainingJobs",
            "pageSize": 2,
            "streams": {
                "job/algo-1": [
                    {"message": "starting", "timestamp": 1, "ingestionTime": 1}
                ]
            }
        }"#;
        let backend = MemoryBackend::from_json(json).unwrap();

        assert_eq!(backend.group(), "/aws/sagemaker/TrainingJobs");
        assert_eq!(backend.page_size(), 2);
        assert_eq!(backend.stream_names(), vec!["job/algo-1".to_string()]);
        assert!(matches!(
            MemoryBackend::from_json("{"),
            Err(BackendError::Fixture(_))
        ));
    }
}
