//! Type-safe event identifier.
//!
//! [`EventId`] is a newtype wrapper around the integer identifier the
//! event log assigns to every logged event, so that event identifiers
//! cannot be confused with timestamps or counts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a logged event.
///
/// Unique within the event log. Used as the dictionary key inside a
/// [`super::DayBucket`] and as the equality key of [`super::EventRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u32);

impl EventId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer identifier.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EventId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<EventId> for u32 {
    fn from(id: EventId) -> Self {
        id.0
    }
}
