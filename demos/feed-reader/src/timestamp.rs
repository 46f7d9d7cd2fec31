//! Feed timestamps, normalized to UTC.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use saxmap::{ConvertError, FromMarkup};

/// A point in time from an Atom date construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// `2024-01-02T03:04:05Z` with any offset, `2024-01-02T03:04:05`
    /// (taken as UTC) or a bare `2024-01-02`.
    pub fn parse_rfc3339(text: &str) -> Result<Self, ConvertError> {
        let trimmed = text.trim();
        if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self(stamp.with_timezone(&Utc)));
        }
        if let Ok(stamp) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
            return Ok(Self(stamp.and_utc()));
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(Self::midnight)
            .map_err(|e| ConvertError::new(text, e))
    }

    /// `02 Jan 2024`, optionally prefixed by a weekday (`Tue, 02 Jan 2024`).
    /// The weekday is not checked against the date.
    pub fn parse_day_month_year(text: &str) -> Result<Self, ConvertError> {
        let trimmed = text.trim();
        let date = trimmed.split_once(", ").map_or(trimmed, |(_, rest)| rest);
        NaiveDate::parse_from_str(date, "%d %b %Y")
            .map(Self::midnight)
            .map_err(|e| ConvertError::new(text, e))
    }

    fn midnight(date: NaiveDate) -> Self {
        Self(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(stamp: DateTime<Utc>) -> Self {
        Self(stamp)
    }
}

impl FromMarkup for Timestamp {
    fn from_markup(text: String) -> Result<Self, ConvertError> {
        Self::parse_rfc3339(&text)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}
