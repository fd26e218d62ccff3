use std::sync::LazyLock;

use futures::future::{self, Either};
use futures::{Stream, TryStreamExt, stream};
use regex::{Captures, Regex};
use tracing::debug;

use logwindow_backend::{FilterLogEventsRequest, LogBackend};
use logwindow_types::{ContinuationToken, LogFilterEvent, StreamGroups, StreamSelector};

use crate::error::{LogError, Result};

/// Pattern search across the streams of one log group
pub struct FilterSource<'a, B> {
    backend: &'a B,
    group: String,
    selector: StreamSelector,
}

impl<'a, B: LogBackend> FilterSource<'a, B> {
    /// Create a search scoped by `selector`; an empty name list or prefix
    /// leaves the search unscoped and is rejected
    pub fn new(backend: &'a B, group: impl Into<String>, selector: StreamSelector) -> Result<Self> {
        let empty = match &selector {
            StreamSelector::ByNames(names) => names.is_empty(),
            StreamSelector::ByPrefix(prefix) => prefix.is_empty(),
        };
        if empty {
            return Err(LogError::InvalidSelector(
                "provide either stream names or a prefix",
            ));
        }

        Ok(Self {
            backend,
            group: group.into(),
            selector,
        })
    }

    /// Create a search from optional names and prefix; exactly one must be
    /// given
    pub fn from_parts(
        backend: &'a B,
        group: impl Into<String>,
        stream_names: Option<Vec<String>>,
        prefix: Option<String>,
    ) -> Result<Self> {
        let stream_names = stream_names.filter(|names| !names.is_empty());
        let prefix = prefix.filter(|prefix| !prefix.is_empty());

        let selector = match (stream_names, prefix) {
            (Some(names), None) => StreamSelector::ByNames(names),
            (None, Some(prefix)) => StreamSelector::ByPrefix(prefix),
            (Some(_), Some(_)) => {
                return Err(LogError::InvalidSelector(
                    "provide either stream names or a prefix, not both",
                ));
            }
            (None, None) => {
                return Err(LogError::InvalidSelector(
                    "provide either stream names or a prefix",
                ));
            }
        };
        Self::new(backend, group, selector)
    }

    /// Lazily fetch pages of events matching `pattern`, ending once the
    /// backend stops returning a token
    pub fn iterate(
        &self,
        pattern: &str,
        limit: Option<u32>,
    ) -> impl Stream<Item = Result<Vec<LogFilterEvent>>> + use<'a, B> {
        let search = Search {
            backend: self.backend,
            request: FilterLogEventsRequest::new(self.group.as_str(), &self.selector)
                .with_pattern(pattern)
                .with_limit(limit),
            token: None,
            done: false,
        };
        stream::try_unfold(search, Search::step)
    }
}

/// Unfold state for a paged search
struct Search<'a, B> {
    backend: &'a B,
    request: FilterLogEventsRequest,
    token: Option<ContinuationToken>,
    done: bool,
}

impl<'a, B: LogBackend> Search<'a, B> {
    async fn step(mut self) -> Result<Option<(Vec<LogFilterEvent>, Self)>> {
        if self.done {
            return Ok(None);
        }

        let request = self.request.clone().with_token(self.token.take());
        let response = self.backend.filter_log_events(request).await?;
        debug!(
            group = %self.request.log_group_name,
            events = response.events.len(),
            more = response.next_token.is_some(),
            "fetched search page"
        );

        self.token = response.next_token.filter(|token| !token.is_empty());
        self.done = self.token.is_none();

        Ok(Some((response.events, self)))
    }
}

/// Every line boundary recognised in static text: CRLF, a lone CR, and the
/// Unicode line and paragraph separators alongside LF
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\r\n|[\n\r\x0B\x0C\x1C-\x1E\x{85}\x{2028}\x{2029}]")
        .expect("line break regex is valid")
});

/// Static text searched as if it were a single unnamed stream
#[derive(Clone, Debug)]
pub struct TextSource {
    text: String,
}

impl TextSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The whole text as one page, one event per line; line ordinals stand
    /// in for timestamps and event ids
    pub fn page(&self) -> Vec<LogFilterEvent> {
        lines(&self.text)
            .enumerate()
            .map(|(idx, line)| LogFilterEvent {
                message: line.to_string(),
                timestamp: idx as i64,
                ingestion_time: idx as i64,
                stream_name: String::new(),
                event_id: idx.to_string(),
            })
            .collect()
    }
}

/// Split on every line boundary; a trailing boundary does not start an
/// extra empty line
fn lines(text: &str) -> impl Iterator<Item = &str> {
    let body = match LINE_BREAK.find_iter(text).last() {
        Some(last) if last.end() == text.len() => &text[..last.start()],
        _ => text,
    };
    (!text.is_empty())
        .then(|| LINE_BREAK.split(body))
        .into_iter()
        .flatten()
}

/// Anything `filter`, `match` and `find` can run against
pub enum QuerySource<'a, B> {
    Filter(FilterSource<'a, B>),
    Text(TextSource),
}

impl<'a, B> From<FilterSource<'a, B>> for QuerySource<'a, B> {
    fn from(source: FilterSource<'a, B>) -> Self {
        Self::Filter(source)
    }
}

impl<B> From<TextSource> for QuerySource<'_, B> {
    fn from(source: TextSource) -> Self {
        Self::Text(source)
    }
}

impl<'a, B: LogBackend> QuerySource<'a, B> {
    /// Pages of candidate events; `pattern` is applied by the backend and
    /// ignored for static text
    pub fn iterate(
        &self,
        pattern: &str,
        limit: Option<u32>,
    ) -> impl Stream<Item = Result<Vec<LogFilterEvent>>> + use<'a, B> {
        match self {
            Self::Filter(source) => Either::Left(source.iterate(pattern, limit)),
            Self::Text(source) => {
                let page = Ok::<_, LogError>(source.page());
                Either::Right(stream::once(future::ready(page)))
            }
        }
    }

    /// Every candidate event, one at a time
    pub fn events(
        &self,
        pattern: &str,
    ) -> impl Stream<Item = Result<LogFilterEvent>> + use<'a, B> {
        self.iterate(pattern, None)
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, LogError>)))
            .try_flatten()
    }

    /// Events whose message matches `regex` at its start, with the
    /// extracted value
    pub fn iter_match(
        &self,
        pattern: &str,
        regex: &str,
    ) -> Result<impl Stream<Item = Result<(String, LogFilterEvent)>> + use<'a, B>> {
        let regex = Regex::new(regex)?;
        Ok(self.events(pattern).try_filter_map(move |event| {
            // leftmost match semantics: a match at 0 exists iff this one starts there
            let value = regex
                .captures(&event.message)
                .filter(|caps| caps.get(0).is_some_and(|m| m.start() == 0))
                .map(|caps| extract(&regex, &caps));
            future::ready(Ok::<_, LogError>(value.map(|value| (value, event))))
        }))
    }

    /// Events whose message contains `regex` anywhere, with the value
    /// extracted from the first occurrence
    pub fn iter_find(
        &self,
        pattern: &str,
        regex: &str,
    ) -> Result<impl Stream<Item = Result<(String, LogFilterEvent)>> + use<'a, B>> {
        let regex = Regex::new(regex)?;
        Ok(self.events(pattern).try_filter_map(move |event| {
            let value = regex
                .captures(&event.message)
                .map(|caps| extract(&regex, &caps));
            future::ready(Ok::<_, LogError>(value.map(|value| (value, event))))
        }))
    }

    /// All events matching `pattern`, grouped by stream
    pub async fn filter(&self, pattern: &str) -> Result<StreamGroups<LogFilterEvent>> {
        let mut groups = StreamGroups::new();
        self.events(pattern)
            .try_for_each(|event| {
                let stream_name = event.stream_name.clone();
                groups.push(&stream_name, event);
                future::ready(Ok::<_, LogError>(()))
            })
            .await?;
        Ok(groups)
    }

    /// Values extracted by an anchored `regex`, grouped by stream.
    ///
    /// The value is the first capture group, or the whole match when the
    /// regex has no groups. Events that do not match are dropped.
    pub async fn match_regex(&self, pattern: &str, regex: &str) -> Result<StreamGroups<String>> {
        group_values(self.iter_match(pattern, regex)?).await
    }

    /// Values extracted from the first unanchored occurrence of `regex`,
    /// grouped by stream. Events with no occurrence are dropped.
    pub async fn find(&self, pattern: &str, regex: &str) -> Result<StreamGroups<String>> {
        group_values(self.iter_find(pattern, regex)?).await
    }
}

fn extract(regex: &Regex, caps: &Captures<'_>) -> String {
    let group = if regex.captures_len() > 1 { 1 } else { 0 };
    caps.get(group)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

async fn group_values<S>(matches: S) -> Result<StreamGroups<String>>
where
    S: Stream<Item = Result<(String, LogFilterEvent)>>,
{
    let mut groups = StreamGroups::new();
    matches
        .try_for_each(|(value, event)| {
            groups.push(&event.stream_name, value);
            future::ready(Ok::<_, LogError>(()))
        })
        .await?;
    Ok(groups)
}
