//! Window planning
//!
//! The reporting API rejects date ranges wider than 31 days, so the span
//! between the checkpoint and now is cut into consecutive windows.

use std::iter::FusedIterator;

use chrono::{DateTime, Duration, Utc};

use crate::models::TimeWindow;

/// Widest range the reporting API accepts, in days
pub const MAX_WINDOW_DAYS: i64 = 31;

/// Widest range the reporting API accepts
pub fn max_window() -> Duration {
    Duration::days(MAX_WINDOW_DAYS)
}

/// Plan the windows covering `[checkpoint, now]`
///
/// Yields nothing when `checkpoint >= now`. The last window always ends
/// exactly at `now`.
pub fn plan_windows(checkpoint: DateTime<Utc>, now: DateTime<Utc>) -> Windows {
    plan_windows_with(checkpoint, now, max_window())
}

/// Plan windows with a custom maximum width
///
/// A non-positive width yields no windows.
pub fn plan_windows_with(checkpoint: DateTime<Utc>, now: DateTime<Utc>, width: Duration) -> Windows {
    Windows {
        cursor: checkpoint,
        now,
        width,
    }
}

/// Lazily produced, ordered sequence of windows
#[derive(Debug, Clone)]
pub struct Windows {
    cursor: DateTime<Utc>,
    now: DateTime<Utc>,
    width: Duration,
}

impl Iterator for Windows {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        if self.cursor >= self.now || self.width <= Duration::zero() {
            return None;
        }

        let end = self
            .cursor
            .checked_add_signed(self.width)
            .map_or(self.now, |end| end.min(self.now));
        let window = TimeWindow::new(self.cursor, end);
        self.cursor = end;
        Some(window)
    }
}

impl FusedIterator for Windows {}
