//! Day-level DTOs: summaries, range queries, and the time map.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{DaySummary, TimeMapEntry, TimeSpan};

/// Query parameters for `GET /days`.
///
/// Both bounds are inclusive `YYYY-MM-DD` dates (or `today` /
/// `yesterday`). Missing bounds default to the week ending today.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DayRangeParams {
    /// First day of the range.
    #[serde(default)]
    pub from: Option<String>,
    /// Last day of the range.
    #[serde(default)]
    pub to: Option<String>,
}

/// State of one day bucket.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DaySummaryDto {
    /// Calendar day.
    #[schema(value_type = String, example = "2024-01-15")]
    pub date: NaiveDate,
    /// First epoch second of the day.
    pub start: i64,
    /// First epoch second after the day.
    pub end: i64,
    /// `false` while the initial query is still outstanding.
    pub loaded: bool,
    /// Records held, pending ones included.
    pub record_count: usize,
    /// Records still waiting for their payload.
    pub pending_count: usize,
}

impl From<DaySummary> for DaySummaryDto {
    fn from(s: DaySummary) -> Self {
        Self {
            date: s.date,
            start: s.range.start,
            end: s.range.end,
            loaded: s.loaded,
            record_count: s.record_count,
            pending_count: s.pending_count,
        }
    }
}

/// Response body for `GET /days`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DayListResponse {
    /// One summary per day, in date order.
    pub data: Vec<DaySummaryDto>,
}

/// One visit in the time map.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimeSpanDto {
    /// Event that opened (or, for a carried-over visit, closed) the span.
    pub event_id: u32,
    /// Start in epoch seconds.
    pub start: i64,
    /// Length in seconds, `0` while open.
    pub duration: i64,
    /// Whether a leave event closed the span.
    pub closed: bool,
}

impl From<&TimeSpan> for TimeSpanDto {
    fn from(span: &TimeSpan) -> Self {
        Self {
            event_id: span.record.id().get(),
            start: span.start,
            duration: span.duration,
            closed: span.closed,
        }
    }
}

/// All visits to one subject URI.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimeMapEntryDto {
    /// Subject URI.
    pub uri: String,
    /// Visits in chronological order.
    pub spans: Vec<TimeSpanDto>,
}

impl From<&TimeMapEntry> for TimeMapEntryDto {
    fn from(entry: &TimeMapEntry) -> Self {
        Self {
            uri: entry.uri.clone(),
            spans: entry.spans.iter().map(TimeSpanDto::from).collect(),
        }
    }
}

/// Response body for `GET /days/{date}/time-map`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimeMapResponse {
    /// Calendar day.
    #[schema(value_type = String, example = "2024-01-15")]
    pub date: NaiveDate,
    /// Entries ordered by the start of their first span.
    pub entries: Vec<TimeMapEntryDto>,
}

/// Response body for `POST /days/{date}/reload`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReloadResponse {
    /// Calendar day.
    #[schema(value_type = String, example = "2024-01-15")]
    pub date: NaiveDate,
    /// Records newly created by the reload.
    pub created: usize,
}
