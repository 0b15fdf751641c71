//! Time windows submitted to the reporting API

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp format the reporting API expects (UTC, second precision)
const API_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format a timestamp the way the reporting API expects it
pub fn format_api_time(time: DateTime<Utc>) -> String {
    time.format(API_TIME_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DDTHH:MM:SSZ` timestamp
pub fn parse_api_time(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, API_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// A half-open range of time `[start, end)` to request transactions for
///
/// Produced by the window planner; always `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Width of the window
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]",
            format_api_time(self.start),
            format_api_time(self.end)
        )
    }
}
