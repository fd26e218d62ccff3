use std::time::Duration;

use futures::{Stream, StreamExt, TryStreamExt, stream};
use tracing::{debug, trace};

use logwindow_backend::{GetLogEventsRequest, LogBackend};
use logwindow_types::{ContinuationToken, LogEvent, MAX_WINDOW, Origin, Page};

use crate::error::{LogError, Result};

/// Poll interval used by `follow` when none is given
pub const DEFAULT_FOLLOW_INTERVAL_SECS: u64 = 30;

/// Settings for a live follow
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FollowOptions {
    /// End of the stream to start from
    pub origin: Origin,

    /// Max events per poll (backend default if unset)
    pub limit: Option<u32>,

    /// Wait between polls once the stream has no new data
    pub interval: Duration,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self {
            origin: Origin::Head,
            limit: None,
            interval: Duration::from_secs(DEFAULT_FOLLOW_INTERVAL_SECS),
        }
    }
}

impl FollowOptions {
    pub fn from_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval = Duration::from_secs(secs);
        self
    }
}

/// One log stream read through a page-at-a-time backend
pub struct StreamSource<'a, B> {
    backend: &'a B,
    group: String,
    stream_name: String,
}

impl<'a, B: LogBackend> StreamSource<'a, B> {
    pub fn new(backend: &'a B, group: impl Into<String>, stream_name: impl Into<String>) -> Self {
        Self {
            backend,
            group: group.into(),
            stream_name: stream_name.into(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Lazily walk the stream one page per pull.
    ///
    /// Starting from the head the walk moves forward and pages are oldest
    /// first. Starting from the tail without `forever` the walk moves back
    /// through history and each page is newest first. With `forever` the
    /// walk always moves forward (from either end) and, whenever the backend
    /// hands back the token it was given, yields [`Page::Idle`] and keeps
    /// resubmitting that token; otherwise the same condition ends the walk.
    pub fn iterate(
        &self,
        origin: Origin,
        limit: Option<u32>,
        forever: bool,
    ) -> impl Stream<Item = Result<Page<LogEvent>>> + use<'a, B> {
        let walk = StreamWalk {
            backend: self.backend,
            group: self.group.clone(),
            stream_name: self.stream_name.clone(),
            origin,
            backward: origin == Origin::Tail && !forever,
            limit,
            forever,
            token: None,
            pending_idle: false,
            done: false,
        };
        stream::try_unfold(walk, StreamWalk::step)
    }

    /// First `n` events, oldest first
    pub fn head(
        &self,
        n: usize,
    ) -> Result<impl Stream<Item = Result<LogEvent>> + use<'a, B>> {
        let limit = window_limit(n)?;
        Ok(events_of(self.iterate(Origin::Head, Some(limit), false)).take(n))
    }

    /// Last `n` events, oldest first
    pub fn tail(
        &self,
        n: usize,
    ) -> Result<impl Stream<Item = Result<LogEvent>> + use<'a, B>> {
        let limit = window_limit(n)?;
        let newest_first = events_of(self.iterate(Origin::Tail, Some(limit), false)).take(n);

        Ok(stream::once(newest_first.try_collect::<Vec<_>>())
            .map_ok(|mut events| {
                events.reverse();
                stream::iter(events.into_iter().map(Ok::<_, LogError>))
            })
            .try_flatten())
    }

    /// Every event in the stream, oldest first
    pub fn cat(&self) -> impl Stream<Item = Result<LogEvent>> + use<'a, B> {
        events_of(self.iterate(Origin::Head, None, false))
    }

    /// Live tail of the stream.
    ///
    /// Sleeps for `options.interval` once per idle poll. The stream never
    /// ends on its own; drop it to stop following.
    pub fn follow(
        &self,
        options: FollowOptions,
    ) -> impl Stream<Item = Result<LogEvent>> + use<'a, B> {
        let interval = options.interval;
        let pages = self
            .iterate(options.origin, options.limit, true)
            .and_then(move |page| async move {
                match page {
                    Page::Idle => {
                        debug!(?interval, "no new events, waiting before next poll");
                        tokio::time::sleep(interval).await;
                        Ok::<_, LogError>(Page::Events(Vec::new()))
                    }
                    page => Ok(page),
                }
            });
        events_of(pages)
    }
}

/// Unfold state for a single stream walk
struct StreamWalk<'a, B> {
    backend: &'a B,
    group: String,
    stream_name: String,
    origin: Origin,
    backward: bool,
    limit: Option<u32>,
    forever: bool,
    token: Option<ContinuationToken>,
    pending_idle: bool,
    done: bool,
}

impl<'a, B: LogBackend> StreamWalk<'a, B> {
    async fn step(mut self) -> Result<Option<(Page<LogEvent>, Self)>> {
        if self.done {
            return Ok(None);
        }
        if self.pending_idle {
            self.pending_idle = false;
            return Ok(Some((Page::Idle, self)));
        }

        let request = GetLogEventsRequest::new(self.group.as_str(), self.stream_name.as_str())
            .with_token(self.token.clone())
            .with_start_from_head(self.origin.is_head())
            .with_limit(self.limit);
        let response = self.backend.get_log_events(request).await?;

        let next = if self.backward {
            response.next_backward_token
        } else {
            response.next_forward_token
        };
        let mut events = response.events;
        debug!(
            stream = %self.stream_name,
            events = events.len(),
            backward = self.backward,
            "fetched stream page"
        );

        if self.backward {
            events.reverse();
        }

        if next == self.token {
            trace!(stream = %self.stream_name, "stream exhausted");
            if self.forever {
                self.pending_idle = true;
            } else {
                self.done = true;
            }
        }
        self.token = next;

        Ok(Some((Page::Events(events), self)))
    }
}

fn window_limit(n: usize) -> Result<u32> {
    if n > MAX_WINDOW {
        return Err(LogError::WindowTooLarge {
            requested: n,
            max: MAX_WINDOW,
        });
    }
    Ok(n.max(1) as u32)
}

fn events_of<S>(pages: S) -> impl Stream<Item = Result<LogEvent>>
where
    S: Stream<Item = Result<Page<LogEvent>>>,
{
    pages
        .map_ok(|page| stream::iter(page.into_events().into_iter().map(Ok::<_, LogError>)))
        .try_flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use logwindow_backend::{BackendError, MemoryBackend};
    use proptest::prelude::*;

    /// Events numbered 1..=count with matching timestamps
    fn numbered(count: usize) -> Vec<LogEvent> {
        (1..=count)
            .map(|i| LogEvent::new(format!("event {}", i), i as i64, i as i64))
            .collect()
    }

    fn backend(count: usize, page_size: usize) -> MemoryBackend {
        MemoryBackend::new("group")
            .with_page_size(page_size)
            .with_stream("stream", numbered(count))
    }

    fn timestamps<S: Stream<Item = Result<LogEvent>>>(events: S) -> Vec<i64> {
        block_on(events.map_ok(|e| e.timestamp).try_collect()).unwrap()
    }

    #[test]
    fn test_head_spans_pages() {
        let backend = backend(15, 5);
        let source = StreamSource::new(&backend, "group", "stream");

        assert_eq!(timestamps(source.head(7).unwrap()), (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn test_tail_spans_pages() {
        let backend = backend(15, 5);
        let source = StreamSource::new(&backend, "group", "stream");

        assert_eq!(timestamps(source.tail(7).unwrap()), (9..=15).collect::<Vec<_>>());
        // newest page, then the one before it; the oldest page is never read
        assert_eq!(backend.request_count(), 2);
    }

    #[test]
    fn test_cat_reads_everything_once() {
        let backend = backend(15, 5);
        let source = StreamSource::new(&backend, "group", "stream");

        assert_eq!(timestamps(source.cat()), (1..=15).collect::<Vec<_>>());
        // three full pages plus the fetch that returns the same token
        assert_eq!(backend.request_count(), 4);
        assert!(backend.requests().iter().all(|r| r.body.get("limit").is_none()));
    }

    #[test]
    fn test_window_too_large_issues_no_requests() {
        let backend = backend(15, 5);
        let source = StreamSource::new(&backend, "group", "stream");

        assert!(matches!(
            source.head(MAX_WINDOW + 1),
            Err(LogError::WindowTooLarge { requested: 10_001, max: 10_000 })
        ));
        assert!(matches!(
            source.tail(MAX_WINDOW + 1),
            Err(LogError::WindowTooLarge { .. })
        ));
        assert_eq!(backend.request_count(), 0);
    }

    #[test]
    fn test_head_sends_limit_and_direction() {
        let backend = backend(3, 5);
        let source = StreamSource::new(&backend, "group", "stream");
        timestamps(source.head(2).unwrap());

        let requests = backend.requests();
        let first = &requests[0].body;
        assert_eq!(first["limit"], 2);
        assert_eq!(first["startFromHead"], true);
        assert!(first.get("nextToken").is_none());
    }

    #[test]
    fn test_finite_walk_stops_on_repeated_token() {
        let backend = backend(4, 2);
        let source = StreamSource::new(&backend, "group", "stream");
        let pages: Vec<_> =
            block_on(source.iterate(Origin::Head, None, false).try_collect()).unwrap();

        let sizes: Vec<_> = pages.into_iter().map(|p| p.into_events().len()).collect();
        assert_eq!(sizes, vec![2, 2, 0]);
    }

    #[test]
    fn test_backward_pages_are_newest_first() {
        let backend = backend(4, 2);
        let source = StreamSource::new(&backend, "group", "stream");
        let pages: Vec<Page<LogEvent>> =
            block_on(source.iterate(Origin::Tail, None, false).try_collect()).unwrap();

        let stamps: Vec<Vec<i64>> = pages
            .into_iter()
            .map(|p| p.into_events().iter().map(|e| e.timestamp).collect())
            .collect();
        assert_eq!(stamps, vec![vec![4, 3], vec![2, 1], vec![]]);
    }

    #[test]
    fn test_forever_walk_yields_idle_marker() {
        let backend = backend(2, 5);
        let source = StreamSource::new(&backend, "group", "stream");
        let pages: Vec<_> =
            block_on(source.iterate(Origin::Head, None, true).take(5).try_collect()).unwrap();

        assert_eq!(pages[0].clone().into_events().len(), 2);
        assert_eq!(pages[1], Page::Events(vec![]));
        assert_eq!(pages[2], Page::Idle);
        assert_eq!(pages[3], Page::Events(vec![]));
        assert_eq!(pages[4], Page::Idle);

        let tokens: Vec<_> = backend
            .requests()
            .iter()
            .map(|r| r.body.get("nextToken").cloned())
            .collect();
        assert_eq!(tokens[1], tokens[2]);
    }

    #[test]
    fn test_backend_error_propagates() {
        let backend = MemoryBackend::new("group");
        let source = StreamSource::new(&backend, "group", "missing");
        let result: Result<Vec<_>> = block_on(source.cat().try_collect());

        assert!(matches!(
            result,
            Err(LogError::Backend(BackendError::StreamNotFound { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_sleeps_once_per_idle_poll() {
        let backend = backend(3, 5);
        let source = StreamSource::new(&backend, "group", "stream");
        let follow = source.follow(FollowOptions::default());
        tokio::pin!(follow);

        for expected in 1..=3 {
            let event = follow.next().await.unwrap().unwrap();
            assert_eq!(event.timestamp, expected);
        }

        let started = tokio::time::Instant::now();
        let waiting = tokio::time::timeout(Duration::from_secs(45), follow.next()).await;
        assert!(waiting.is_err());
        // initial page, empty page, then one re-poll after the first sleep
        assert_eq!(backend.request_count(), 3);
        assert!(started.elapsed() >= Duration::from_secs(45));

        backend.append("stream", [LogEvent::new("late", 4, 4)]);
        let event = follow.next().await.unwrap().unwrap();
        assert_eq!(event.message, "late");
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_from_tail_starts_at_newest() {
        let backend = backend(10, 100);
        let source = StreamSource::new(&backend, "group", "stream");
        let options = FollowOptions::default()
            .from_origin(Origin::Tail)
            .with_limit(Some(2))
            .with_interval_secs(1);
        let follow = source.follow(options);
        tokio::pin!(follow);

        let first = follow.next().await.unwrap().unwrap();
        let second = follow.next().await.unwrap().unwrap();
        assert_eq!((first.timestamp, second.timestamp), (9, 10));

        backend.append("stream", numbered(12).into_iter().skip(10));
        let third = follow.next().await.unwrap().unwrap();
        assert_eq!(third.timestamp, 11);
    }

    proptest! {
        #[test]
        fn prop_head_is_oldest_window(total in 0usize..60, n in 0usize..80, page_size in 1usize..12) {
            let backend = backend(total, page_size);
            let source = StreamSource::new(&backend, "group", "stream");
            let expected: Vec<i64> = (1..=total.min(n) as i64).collect();

            prop_assert_eq!(timestamps(source.head(n).unwrap()), expected);
        }

        #[test]
        fn prop_tail_is_newest_window(total in 0usize..60, n in 0usize..80, page_size in 1usize..12) {
            let backend = backend(total, page_size);
            let source = StreamSource::new(&backend, "group", "stream");
            let first = (total - total.min(n)) as i64 + 1;
            let expected: Vec<i64> = (first..=total as i64).collect();

            prop_assert_eq!(timestamps(source.tail(n).unwrap()), expected);
        }

        #[test]
        fn prop_cat_has_no_gaps_or_repeats(total in 0usize..60, page_size in 1usize..12) {
            let backend = backend(total, page_size);
            let source = StreamSource::new(&backend, "group", "stream");
            let expected: Vec<i64> = (1..=total as i64).collect();

            prop_assert_eq!(timestamps(source.cat()), expected);
        }
    }
}
