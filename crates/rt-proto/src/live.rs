//! Live-show detection.
//!
//! A show counts as live from its announced start until `window_minutes`
//! later, both ends inclusive. The weekly schedule is only used to tell the
//! user when the next show is due.

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Utc, Weekday};
use serde::Serialize;

use crate::protocol::ShowStart;

/// Length of the live window after the announced start.
pub const LIVE_WINDOW_MINUTES: f64 = 300.0;

#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("unrecognised show start timestamp: {0:?}")]
    BadTimestamp(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveStatus {
    pub started_at: DateTime<Utc>,
    pub is_live: bool,
    /// Fractional minutes; negative when the start lies in the future.
    pub minutes_since_start: f64,
}

impl LiveStatus {
    pub fn evaluate(started_at: DateTime<Utc>, now: DateTime<Utc>, window_minutes: f64) -> Self {
        let minutes_since_start = (now - started_at).num_milliseconds() as f64 / 60_000.0;
        Self {
            started_at,
            is_live: is_within_window(minutes_since_start, window_minutes),
            minutes_since_start,
        }
    }

    pub fn from_show_start(
        show: &ShowStart,
        now: DateTime<Utc>,
        window_minutes: f64,
    ) -> Result<Self, LiveError> {
        let started_at = parse_timestamp(&show.started)?;
        Ok(Self::evaluate(started_at, now, window_minutes))
    }
}

pub fn is_within_window(minutes_since_start: f64, window_minutes: f64) -> bool {
    (0.0..=window_minutes).contains(&minutes_since_start)
}

/// Parse an ISO-8601 timestamp. Timestamps without an offset are UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, LiveError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(LiveError::BadTimestamp(raw.to_string()))
}

/// Regular weekly slot of the live show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShowSchedule {
    pub weekday: Weekday,
    pub hour_utc: u32,
}

impl Default for ShowSchedule {
    fn default() -> Self {
        Self {
            weekday: Weekday::Sat,
            hour_utc: 22,
        }
    }
}

/// First scheduled start strictly after `now`.
pub fn next_show_after(now: DateTime<Utc>, schedule: ShowSchedule) -> DateTime<Utc> {
    let today = now.date_naive();
    for offset in 0..=7 {
        let date = today + Duration::days(offset);
        if date.weekday() != schedule.weekday {
            continue;
        }
        if let Some(start) = date.and_hms_opt(schedule.hour_utc, 0, 0) {
            let start = start.and_utc();
            if start > now {
                return start;
            }
        }
    }
    now + Duration::days(7)
}

/// "Sat 24.10.2026 22:00 UTC"
pub fn format_show_time(at: DateTime<Utc>) -> String {
    at.format("%a %d.%m.%Y %H:%M UTC").to_string()
}
