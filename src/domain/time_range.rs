//! Half-open time ranges and calendar-day boundaries.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use super::Timestamp;
use crate::error::JournalError;

/// A half-open `[start, end)` range of epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// First second inside the range.
    pub start: Timestamp,
    /// First second after the range.
    pub end: Timestamp,
}

impl TimeRange {
    /// Creates a range from explicit bounds.
    #[must_use]
    pub const fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// A range covering every representable timestamp.
    #[must_use]
    pub const fn everything() -> Self {
        Self {
            start: Timestamp::MIN,
            end: Timestamp::MAX,
        }
    }

    /// Computes the range of one calendar day in the given timezone:
    /// local midnight up to (excluding) the following local midnight.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidDate`] if the day or its successor
    /// cannot be represented.
    pub fn for_day(date: NaiveDate, tz: &FixedOffset) -> Result<Self, JournalError> {
        let next = date
            .succ_opt()
            .ok_or_else(|| JournalError::InvalidDate(format!("{date} has no successor")))?;
        let start = local_midnight(date, tz)?;
        let end = local_midnight(next, tz)?;
        Ok(Self { start, end })
    }

    /// Returns `true` if `ts` lies inside the range.
    #[must_use]
    pub const fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts < self.end
    }

    /// Returns `true` if the two ranges share at least one second.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Length of the range in seconds.
    #[must_use]
    pub const fn duration(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }
}

/// Returns the calendar date `ts` falls on in the given timezone.
#[must_use]
pub fn local_date(ts: Timestamp, tz: &FixedOffset) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.with_timezone(tz).date_naive())
}

fn local_midnight(date: NaiveDate, tz: &FixedOffset) -> Result<Timestamp, JournalError> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .single()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| JournalError::InvalidDate(format!("{date} has no local midnight")))
}
