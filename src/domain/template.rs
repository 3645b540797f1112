//! Event templates and result grouping.
//!
//! An [`EventTemplate`] is a partial event used as a predicate. Every set
//! field must match; unset fields match anything. Field values follow the
//! event log's template conventions:
//!
//! - a trailing `*` turns the value into a prefix match,
//! - a leading `!` negates the match.
//!
//! Subject fields are matched together against each subject of an event;
//! the template matches if any single subject satisfies all of them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Event, Subject};

/// A partial event used to select events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTemplate {
    /// Event interpretation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
    /// Event manifestation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifestation: Option<String>,
    /// Actor URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Subject URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_uri: Option<String>,
    /// Subject interpretation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_interpretation: Option<String>,
    /// Subject MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_mimetype: Option<String>,
}

impl EventTemplate {
    /// A template matching every event.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// A template matching the given event interpretation.
    #[must_use]
    pub fn with_interpretation(interpretation: impl Into<String>) -> Self {
        Self {
            interpretation: Some(interpretation.into()),
            ..Self::default()
        }
    }

    /// A template matching the given subject URI pattern.
    #[must_use]
    pub fn with_subject_uri(pattern: impl Into<String>) -> Self {
        Self {
            subject_uri: Some(pattern.into()),
            ..Self::default()
        }
    }

    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns `true` if the event satisfies the template.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        field_matches(self.interpretation.as_deref(), &event.interpretation)
            && field_matches(self.manifestation.as_deref(), &event.manifestation)
            && field_matches(self.actor.as_deref(), &event.actor)
            && self.matches_subjects(&event.subjects)
    }

    fn has_subject_fields(&self) -> bool {
        self.subject_uri.is_some()
            || self.subject_interpretation.is_some()
            || self.subject_mimetype.is_some()
    }

    fn matches_subjects(&self, subjects: &[Subject]) -> bool {
        if !self.has_subject_fields() {
            return true;
        }
        subjects.iter().any(|s| {
            field_matches(self.subject_uri.as_deref(), &s.uri)
                && field_matches(self.subject_interpretation.as_deref(), &s.interpretation)
                && field_matches(self.subject_mimetype.as_deref(), &s.mimetype)
        })
    }
}

/// Returns `true` if the event matches any template, or if there are none.
#[must_use]
pub fn matches_any(templates: &[EventTemplate], event: &Event) -> bool {
    templates.is_empty() || templates.iter().any(|t| t.matches(event))
}

fn field_matches(pattern: Option<&str>, value: &str) -> bool {
    let Some(pattern) = pattern else {
        return true;
    };
    let (negated, pattern) = match pattern.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    let hit = match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => value == pattern,
    };
    hit != negated
}

/// How [`super::DayBucket::filter`] collapses its matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// Every match, in timestamp order.
    #[default]
    None,
    /// One record per subject URI: the most recent one. Most recent first.
    MostRecentSubjects,
    /// One record per subject URI (the most recent), ordered by how many
    /// events touched that URI, busiest first.
    MostPopularSubjects,
}

impl Grouping {
    /// Returns the grouping as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::MostRecentSubjects => "most_recent_subjects",
            Self::MostPopularSubjects => "most_popular_subjects",
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grouping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(Self::None),
            "most_recent_subjects" | "most_recent" => Ok(Self::MostRecentSubjects),
            "most_popular_subjects" | "most_popular" => Ok(Self::MostPopularSubjects),
            other => Err(format!("unknown grouping: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventId;
    use crate::domain::event::interpretation;

    fn event(interp: &str, uri: &str, mimetype: &str) -> Event {
        Event {
            id: EventId::new(1),
            timestamp: 0,
            interpretation: interp.to_string(),
            manifestation: String::new(),
            actor: "application://firefox.desktop".to_string(),
            subjects: vec![Subject {
                uri: uri.to_string(),
                mimetype: mimetype.to_string(),
                ..Subject::default()
            }],
        }
    }

    #[test]
    fn empty_template_list_matches_everything() {
        let e = event(interpretation::ACCESS_EVENT, "https://a.org", "text/html");
        assert!(matches_any(&[], &e));
        assert!(EventTemplate::any().matches(&e));
    }

    #[test]
    fn interpretation_exact_match() {
        let e = event(interpretation::ACCESS_EVENT, "https://a.org", "text/html");
        assert!(EventTemplate::with_interpretation(interpretation::ACCESS_EVENT).matches(&e));
        assert!(!EventTemplate::with_interpretation(interpretation::LEAVE_EVENT).matches(&e));
    }

    #[test]
    fn uri_prefix_wildcard() {
        let e = event(interpretation::ACCESS_EVENT, "file:///home/u/a.txt", "text/plain");
        assert!(EventTemplate::with_subject_uri("file:///home/*").matches(&e));
        assert!(!EventTemplate::with_subject_uri("https://*").matches(&e));
    }

    #[test]
    fn negation_inverts_field() {
        let e = event(interpretation::ACCESS_EVENT, "https://a.org", "text/html");
        let template = EventTemplate {
            subject_mimetype: Some("!image/*".to_string()),
            ..EventTemplate::default()
        };
        assert!(template.matches(&e));

        let image = event(interpretation::ACCESS_EVENT, "file:///p.png", "image/png");
        assert!(!template.matches(&image));
    }

    #[test]
    fn subject_fields_must_hold_on_the_same_subject() {
        let mut e = event(interpretation::ACCESS_EVENT, "https://a.org", "text/html");
        e.subjects.push(Subject {
            uri: "file:///b.png".to_string(),
            mimetype: "image/png".to_string(),
            ..Subject::default()
        });
        let split = EventTemplate {
            subject_uri: Some("https://*".to_string()),
            subject_mimetype: Some("image/png".to_string()),
            ..EventTemplate::default()
        };
        assert!(!split.matches(&e));
    }

    #[test]
    fn any_of_several_templates() {
        let e = event(interpretation::LEAVE_EVENT, "https://a.org", "text/html");
        let templates = [
            EventTemplate::with_interpretation(interpretation::ACCESS_EVENT),
            EventTemplate::with_interpretation(interpretation::LEAVE_EVENT),
        ];
        assert!(matches_any(&templates, &e));
    }

    #[test]
    fn grouping_parses_aliases() {
        assert_eq!("most_recent".parse(), Ok(Grouping::MostRecentSubjects));
        assert_eq!("".parse(), Ok(Grouping::None));
        assert!("by_color".parse::<Grouping>().is_err());
        assert_eq!(Grouping::MostPopularSubjects.to_string(), "most_popular_subjects");
    }
}
