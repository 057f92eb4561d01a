//! Time window resolution.
//!
//! Computes the `[start, end)` half-open UTC interval a pipeline run will
//! query. Either both explicit endpoints are supplied verbatim, or the
//! window defaults to `duration_days` ending at the most recent UTC
//! midnight (midnight yesterday to midnight today for the default of 1).

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{FILE_TIMESTAMP_FORMAT, KEY_TIMESTAMP_FORMAT};

/// Default query duration when neither endpoints nor a duration are given.
pub const DEFAULT_DURATION_DAYS: i64 = 1;

/// Malformed or inverted time window. Fatal before any fetch is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time window: start {start} is not before end {end}")]
pub struct InvalidRangeError {
    /// Requested window start.
    pub start: DateTime<Utc>,
    /// Requested window end.
    pub end: DateTime<Utc>,
}

/// Half-open `[start, end)` UTC interval, `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive start.
    #[serde(with = "crate::model::utc_second")]
    pub start: DateTime<Utc>,
    /// Exclusive end.
    #[serde(with = "crate::model::utc_second")]
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window from explicit endpoints.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, InvalidRangeError> {
        if start >= end {
            return Err(InvalidRangeError { start, end });
        }
        Ok(Self { start, end })
    }

    /// Resolve the window to query.
    ///
    /// Explicit endpoints win when both are present. Otherwise the window
    /// spans `duration_days` (default 1) ending at the most recent UTC
    /// midnight. No side effects.
    pub fn resolve(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        duration_days: Option<i64>,
    ) -> Result<Self, InvalidRangeError> {
        if let (Some(start), Some(end)) = (start, end) {
            return Self::new(start, end);
        }
        let days = duration_days.unwrap_or(DEFAULT_DURATION_DAYS);
        let end = last_utc_midnight();
        Self::new(end - Duration::days(days), end)
    }

    /// Window start rendered in the persistence-key canonical form.
    #[must_use]
    pub fn start_key(&self) -> String {
        self.start.format(KEY_TIMESTAMP_FORMAT).to_string()
    }

    /// Window endpoints rendered in the file-naming canonical form.
    #[must_use]
    pub fn file_stamps(&self) -> (String, String) {
        (
            self.start.format(FILE_TIMESTAMP_FORMAT).to_string(),
            self.end.format(FILE_TIMESTAMP_FORMAT).to_string(),
        )
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (start, end) = self.file_stamps();
        write!(f, "[{start}, {end})")
    }
}

/// Most recent UTC midnight (00:00:00 of the current UTC day).
#[must_use]
pub fn last_utc_midnight() -> DateTime<Utc> {
    Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
}

/// Parse a user-supplied datetime argument.
///
/// Accepts the file-naming form (`2024-01-01T00:00:00Z`), the key form
/// (`2024-01-01 00:00:00`), and a bare date (`2024-01-01`, midnight).
#[must_use]
pub fn parse_datetime_arg(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, FILE_TIMESTAMP_FORMAT) {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, KEY_TIMESTAMP_FORMAT) {
        return Some(dt.and_utc());
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
