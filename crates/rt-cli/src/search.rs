//! Episode search flow: debounced query, result-set selection and row
//! formatting for the episode browser.

use std::time::{Duration, Instant};

use rt_proto::protocol::{Episode, TimeLabel};

/// Quiet period before a search query is acted on.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Episodes fetched per list.
pub const EPISODE_LIMIT: usize = 9;

/// Longest topic title shown before truncation.
pub const TOPIC_TITLE_MAX: usize = 45;

// ── Debounce ──────────────────────────────────────────────────────────────────

/// Holds back a changing value until it has been stable for `delay`.
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
    last_emitted: Option<T>,
}

impl<T: Clone + PartialEq> Debouncer<T> {
    /// Treat `value` as already emitted, so pushing it back is a no-op.
    pub fn with_initial(delay: Duration, value: T) -> Self {
        Self {
            delay,
            pending: None,
            last_emitted: Some(value),
        }
    }

    /// Record a new input; restarts the quiet period.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    /// The settled value, once its quiet period has passed.  A value equal
    /// to the previous emission is swallowed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = matches!(&self.pending, Some((_, deadline)) if *deadline <= now);
        if !due {
            return None;
        }
        let (value, _) = self.pending.take()?;
        if self.last_emitted.as_ref() == Some(&value) {
            return None;
        }
        self.last_emitted = Some(value.clone());
        Some(value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

// ── Result sets ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Latest,
    Search,
}

/// A fetch the caller should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub kind: FeedKind,
    pub query: String,
}

/// Latest and search result sets.  The search set is shown while the
/// settled query is non-empty; otherwise the latest episodes are.  A set
/// keeps its previous contents until a fresh result replaces it.
#[derive(Default)]
pub struct EpisodeFeed {
    query: String,
    latest: Option<Vec<Episode>>,
    search: Option<Vec<Episode>>,
    loading_latest: bool,
    loading_search: bool,
}

impl EpisodeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settle on `query` and return the fetch it calls for.
    pub fn set_query(&mut self, query: &str) -> FetchRequest {
        self.query = query.trim().to_string();
        if self.query.is_empty() {
            self.loading_latest = true;
            FetchRequest {
                kind: FeedKind::Latest,
                query: String::new(),
            }
        } else {
            self.loading_search = true;
            FetchRequest {
                kind: FeedKind::Search,
                query: self.query.clone(),
            }
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mode(&self) -> FeedKind {
        if self.query.is_empty() {
            FeedKind::Latest
        } else {
            FeedKind::Search
        }
    }

    /// Store a finished fetch.  Search results for a query that is no longer
    /// current are dropped; returns whether anything changed.
    pub fn apply(&mut self, request: &FetchRequest, episodes: Vec<Episode>) -> bool {
        match request.kind {
            FeedKind::Latest => {
                self.latest = Some(episodes);
                self.loading_latest = false;
                true
            }
            FeedKind::Search if request.query == self.query => {
                self.search = Some(episodes);
                self.loading_search = false;
                true
            }
            FeedKind::Search => false,
        }
    }

    /// A fetch failed; the previous contents stay visible.
    pub fn fail(&mut self, request: &FetchRequest) {
        match request.kind {
            FeedKind::Latest => self.loading_latest = false,
            FeedKind::Search if request.query == self.query => self.loading_search = false,
            FeedKind::Search => {}
        }
    }

    pub fn displayed(&self) -> &[Episode] {
        let set = match self.mode() {
            FeedKind::Latest => &self.latest,
            FeedKind::Search => &self.search,
        };
        set.as_deref().unwrap_or(&[])
    }

    pub fn is_loading(&self) -> bool {
        match self.mode() {
            FeedKind::Latest => self.loading_latest,
            FeedKind::Search => self.loading_search,
        }
    }
}

// ── Rows ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TopicLine {
    pub title: String,
    pub offset: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRow {
    pub title: String,
    pub date: String,
    pub topics: Vec<TopicLine>,
}

impl From<&Episode> for EpisodeRow {
    fn from(e: &Episode) -> Self {
        let offsets = topic_start_times(&e.time_labels);
        let topics = e
            .time_labels
            .iter()
            .zip(offsets)
            .map(|(label, offset)| TopicLine {
                title: trim_topic_title(&label.topic, TOPIC_TITLE_MAX),
                offset,
            })
            .collect();
        Self {
            title: e.title.clone(),
            date: format_date(&e.date),
            topics,
        }
    }
}

/// `HH:MM:SS`
pub fn format_offset(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Start offset of every topic: the sum of the durations before it.
pub fn topic_start_times(labels: &[TimeLabel]) -> Vec<String> {
    labels
        .iter()
        .scan(0u64, |elapsed, label| {
            let start = *elapsed;
            *elapsed = elapsed.saturating_add(label.duration);
            Some(format_offset(start))
        })
        .collect()
}

pub fn trim_topic_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let kept: String = title.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// `dd.mm.yyyy` in local time; unparseable input is returned unchanged.
pub fn format_date(raw: &str) -> String {
    format_date_in(raw, &chrono::Local)
}

fn format_date_in<Tz: chrono::TimeZone>(raw: &str, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match rt_proto::live::parse_timestamp(raw) {
        Ok(dt) => dt.with_timezone(tz).format("%d.%m.%Y").to_string(),
        Err(_) => raw.to_string(),
    }
}
