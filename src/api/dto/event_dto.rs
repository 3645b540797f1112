//! Event DTOs: filtered listings, ingestion, and resolved content.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::content::{ContentObject, Preview};
use crate::domain::{Event, EventRecord, EventTemplate, Grouping, NewEvent, Subject};
use crate::error::JournalError;

/// Query parameters for `GET /days/{date}/events`.
///
/// Set fields build a single event template (`*` suffix for prefix
/// matches, `!` prefix to negate). No field set means every event.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventFilterParams {
    /// Event interpretation URI.
    pub interpretation: Option<String>,
    /// Event manifestation URI.
    pub manifestation: Option<String>,
    /// Actor URI, e.g. `application://firefox.desktop`.
    pub actor: Option<String>,
    /// Subject URI pattern, e.g. `file:///home/*`.
    pub subject_uri: Option<String>,
    /// Subject interpretation URI.
    pub subject_interpretation: Option<String>,
    /// Subject MIME type, e.g. `image/*`.
    pub mimetype: Option<String>,
    /// `none`, `most_recent_subjects` or `most_popular_subjects`.
    pub grouping: Option<String>,
}

impl EventFilterParams {
    /// Template list for the query: empty when no field is set.
    #[must_use]
    pub fn templates(&self) -> Vec<EventTemplate> {
        let template = EventTemplate {
            interpretation: self.interpretation.clone(),
            manifestation: self.manifestation.clone(),
            actor: self.actor.clone(),
            subject_uri: self.subject_uri.clone(),
            subject_interpretation: self.subject_interpretation.clone(),
            subject_mimetype: self.mimetype.clone(),
        };
        if template.is_empty() {
            Vec::new()
        } else {
            vec![template]
        }
    }

    /// Parsed grouping, [`Grouping::None`] when absent.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidRequest`] for unknown values.
    pub fn grouping(&self) -> Result<Grouping, JournalError> {
        self.grouping
            .as_deref()
            .map_or(Ok(Grouping::None), str::parse)
            .map_err(JournalError::InvalidRequest)
    }
}

/// Event subject.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubjectDto {
    /// Subject URI.
    pub uri: String,
    /// Subject interpretation URI.
    #[serde(default)]
    pub interpretation: String,
    /// Subject manifestation URI.
    #[serde(default)]
    pub manifestation: String,
    /// MIME type.
    #[serde(default)]
    pub mimetype: String,
    /// Origin URI (containing folder, site, account).
    #[serde(default)]
    pub origin: String,
    /// Display text.
    #[serde(default)]
    pub text: String,
}

impl From<&Subject> for SubjectDto {
    fn from(s: &Subject) -> Self {
        Self {
            uri: s.uri.clone(),
            interpretation: s.interpretation.clone(),
            manifestation: s.manifestation.clone(),
            mimetype: s.mimetype.clone(),
            origin: s.origin.clone(),
            text: s.text.clone(),
        }
    }
}

impl From<SubjectDto> for Subject {
    fn from(s: SubjectDto) -> Self {
        Self {
            uri: s.uri,
            interpretation: s.interpretation,
            manifestation: s.manifestation,
            mimetype: s.mimetype,
            origin: s.origin,
            text: s.text,
        }
    }
}

/// A loaded event.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventDto {
    /// Event identifier assigned by the log.
    pub id: u32,
    /// Epoch seconds.
    pub timestamp: i64,
    /// The same instant in UTC.
    pub datetime: Option<DateTime<Utc>>,
    /// Event interpretation URI.
    pub interpretation: String,
    /// Event manifestation URI.
    pub manifestation: String,
    /// Actor URI.
    pub actor: String,
    /// Subjects, primary first.
    pub subjects: Vec<SubjectDto>,
}

impl From<&Event> for EventDto {
    fn from(e: &Event) -> Self {
        Self {
            id: e.id.get(),
            timestamp: e.timestamp,
            datetime: e.datetime(),
            interpretation: e.interpretation.clone(),
            manifestation: e.manifestation.clone(),
            actor: e.actor.clone(),
            subjects: e.subjects.iter().map(SubjectDto::from).collect(),
        }
    }
}

impl EventDto {
    /// Converts loaded records, skipping any still pending.
    #[must_use]
    pub fn from_records(records: &[EventRecord]) -> Vec<Self> {
        records
            .iter()
            .filter_map(EventRecord::event)
            .map(Self::from)
            .collect()
    }
}

/// Response body for `GET /days/{date}/events`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DayEventsResponse {
    /// Calendar day.
    #[schema(value_type = String, example = "2024-01-15")]
    pub date: NaiveDate,
    /// Grouping that was applied.
    pub grouping: String,
    /// Records of the day still waiting for their payload.
    pub pending: usize,
    /// Matching events.
    pub data: Vec<EventDto>,
}

/// Event to ingest.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewEventDto {
    /// Epoch seconds; defaults to now.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Event interpretation URI.
    pub interpretation: String,
    /// Event manifestation URI.
    #[serde(default)]
    pub manifestation: String,
    /// Actor URI.
    #[serde(default)]
    pub actor: String,
    /// Subjects, primary first.
    #[serde(default)]
    pub subjects: Vec<SubjectDto>,
}

impl From<NewEventDto> for NewEvent {
    fn from(dto: NewEventDto) -> Self {
        Self {
            timestamp: dto.timestamp.unwrap_or_else(|| Utc::now().timestamp()),
            interpretation: dto.interpretation,
            manifestation: dto.manifestation,
            actor: dto.actor,
            subjects: dto.subjects.into_iter().map(Subject::from).collect(),
        }
    }
}

/// Request body for `POST /events`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LogEventsRequest {
    /// Events to append to the log.
    pub events: Vec<NewEventDto>,
}

/// Response body for `POST /events` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct LogEventsResponse {
    /// Identifiers assigned by the log, in request order.
    pub ids: Vec<u32>,
}

/// Resolved content of an event's primary subject.
#[derive(Debug, Serialize, ToSchema)]
pub struct ContentDto {
    /// Subject URI.
    pub uri: String,
    /// `file`, `web`, `application`, `conversation` or `generic`.
    pub kind: String,
    /// Display title.
    pub title: String,
    /// Freedesktop icon name.
    pub icon_name: String,
    /// MIME type, empty when unknown.
    pub mimetype: String,
    /// Whether a preview can be rendered.
    pub preview_available: bool,
    /// Local path backing the preview.
    pub preview_path: Option<String>,
    /// File size in bytes, for previewable files.
    pub size: Option<u64>,
    /// Last modification of the backing file.
    pub modified: Option<DateTime<Utc>>,
    /// Handler that built the object.
    pub handler: String,
}

impl From<&ContentObject> for ContentDto {
    fn from(c: &ContentObject) -> Self {
        let (preview_path, size, modified) = match &c.preview {
            Preview::Available {
                path,
                size,
                modified,
            } => (
                Some(path.to_string_lossy().into_owned()),
                Some(*size),
                *modified,
            ),
            Preview::Unavailable => (None, None, None),
        };
        Self {
            uri: c.uri.clone(),
            kind: c.kind.as_str().to_string(),
            title: c.title.clone(),
            icon_name: c.icon_name.clone(),
            mimetype: c.mimetype.clone(),
            preview_available: c.preview.is_available(),
            preview_path,
            size,
            modified,
            handler: c.handler.to_string(),
        }
    }
}
