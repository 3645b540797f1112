//! Logged activity events and their subjects.
//!
//! An [`Event`] is the payload the event log returns for an identifier:
//! when it happened, who did it, what kind of activity it was, and the
//! [`Subject`]s it is about. Payloads are immutable once fetched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EventId;

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

/// Ontology URIs used by the event log for event and subject categories.
pub mod interpretation {
    /// The user opened or focused a subject.
    pub const ACCESS_EVENT: &str = "http://www.zeitgeist-project.com/ontologies/2010/01/27/zg#AccessEvent";
    /// The user closed or left a subject.
    pub const LEAVE_EVENT: &str = "http://www.zeitgeist-project.com/ontologies/2010/01/27/zg#LeaveEvent";
    /// The subject was modified.
    pub const MODIFY_EVENT: &str = "http://www.zeitgeist-project.com/ontologies/2010/01/27/zg#ModifyEvent";
    /// The subject was created.
    pub const CREATE_EVENT: &str = "http://www.zeitgeist-project.com/ontologies/2010/01/27/zg#CreateEvent";
    /// The subject was deleted.
    pub const DELETE_EVENT: &str = "http://www.zeitgeist-project.com/ontologies/2010/01/27/zg#DeleteEvent";
    /// The user sent the subject (message, mail).
    pub const SEND_EVENT: &str = "http://www.zeitgeist-project.com/ontologies/2010/01/27/zg#SendEvent";
    /// The user received the subject (message, mail).
    pub const RECEIVE_EVENT: &str = "http://www.zeitgeist-project.com/ontologies/2010/01/27/zg#ReceiveEvent";

    /// Text documents.
    pub const DOCUMENT: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#Document";
    /// Images.
    pub const IMAGE: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#Image";
    /// Videos.
    pub const VIDEO: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#Video";
    /// Audio files.
    pub const AUDIO: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#Audio";
    /// Web pages.
    pub const WEBSITE: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#Website";
    /// Source code files.
    pub const SOURCE_CODE: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#SourceCode";
    /// Instant-messaging conversations.
    pub const IM_MESSAGE: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nmo#IMMessage";
    /// Email messages.
    pub const EMAIL: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nmo#Email";
}

/// Ontology URIs describing how a subject or event came to exist.
pub mod manifestation {
    /// A subject that lives in a file.
    pub const FILE_DATA_OBJECT: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#FileDataObject";
    /// A subject reached over the network.
    pub const REMOTE_DATA_OBJECT: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#RemoteDataObject";
    /// An event caused by direct user action.
    pub const USER_ACTIVITY: &str = "http://www.zeitgeist-project.com/ontologies/2010/01/27/zg#UserActivity";
}

/// The object an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subject {
    /// Location of the subject (`file:///...`, `https://...`, ...).
    pub uri: String,
    /// Semantic category (see [`interpretation`]).
    #[serde(default)]
    pub interpretation: String,
    /// Storage category (see [`manifestation`]).
    #[serde(default)]
    pub manifestation: String,
    /// MIME type, empty when unknown.
    #[serde(default)]
    pub mimetype: String,
    /// Containing location, e.g. the parent folder or site.
    #[serde(default)]
    pub origin: String,
    /// Display text.
    #[serde(default)]
    pub text: String,
}

impl Subject {
    /// Creates a subject with only its URI set.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Returns the URI scheme, lower-cased, if the URI has one.
    #[must_use]
    pub fn scheme(&self) -> Option<String> {
        let (scheme, _) = self.uri.split_once(':')?;
        if scheme.is_empty() {
            return None;
        }
        Some(scheme.to_ascii_lowercase())
    }
}

/// A logged activity event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier assigned by the event log.
    pub id: EventId,
    /// When the event happened.
    pub timestamp: Timestamp,
    /// Kind of activity (see [`interpretation`]).
    pub interpretation: String,
    /// How the event was produced (see [`manifestation`]).
    #[serde(default)]
    pub manifestation: String,
    /// Application that performed the activity, as an `application://` URI.
    #[serde(default)]
    pub actor: String,
    /// What the event is about; the first subject is the primary one.
    pub subjects: Vec<Subject>,
}

impl Event {
    /// Returns the subject used for grouping and content resolution.
    #[must_use]
    pub fn primary_subject(&self) -> Option<&Subject> {
        self.subjects.first()
    }

    /// Returns the URI of the primary subject.
    #[must_use]
    pub fn primary_uri(&self) -> Option<&str> {
        self.primary_subject().map(|s| s.uri.as_str())
    }

    /// Returns `true` for leave events, which close an earlier access.
    #[must_use]
    pub fn is_leave(&self) -> bool {
        self.interpretation == interpretation::LEAVE_EVENT
    }

    /// Returns the timestamp as a UTC datetime.
    #[must_use]
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// An event submitted for logging; the log assigns its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// When the event happened.
    pub timestamp: Timestamp,
    /// Kind of activity.
    pub interpretation: String,
    /// How the event was produced.
    #[serde(default)]
    pub manifestation: String,
    /// Application that performed the activity.
    #[serde(default)]
    pub actor: String,
    /// Subjects of the event.
    pub subjects: Vec<Subject>,
}

impl NewEvent {
    /// Attaches the id assigned by the log.
    #[must_use]
    pub fn with_id(self, id: EventId) -> Event {
        Event {
            id,
            timestamp: self.timestamp,
            interpretation: self.interpretation,
            manifestation: self.manifestation,
            actor: self.actor,
            subjects: self.subjects,
        }
    }
}
