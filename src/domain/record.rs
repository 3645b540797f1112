//! A single event as held by a day bucket.
//!
//! An [`EventRecord`] starts either *pending* (only the identifier is
//! known) or *loaded* (the payload came with it). A pending record gets
//! its payload exactly once, either from a batch fetch issued by its
//! bucket, from a live insertion that carries it, or from an explicit
//! [`EventRecord::fetch`]. The payload never changes afterwards.

use std::sync::Arc;

use tokio::sync::OnceCell;

use super::{Event, EventId};
use crate::content::{ContentObject, ContentResolver};
use crate::error::JournalError;
use crate::log::EventLog;

#[derive(Debug)]
struct RecordInner {
    id: EventId,
    event: OnceCell<Event>,
    content: OnceCell<Option<Arc<ContentObject>>>,
}

/// Cheaply clonable handle to an event held by a [`super::DayBucket`].
///
/// Clones share the same payload and content cells. Equality is by
/// event identifier only.
#[derive(Debug, Clone)]
pub struct EventRecord {
    inner: Arc<RecordInner>,
}

impl EventRecord {
    /// Creates a record whose payload has not been fetched yet.
    #[must_use]
    pub fn pending(id: EventId) -> Self {
        Self {
            inner: Arc::new(RecordInner {
                id,
                event: OnceCell::new(),
                content: OnceCell::new(),
            }),
        }
    }

    /// Creates a record from a payload that is already known.
    #[must_use]
    pub fn loaded(event: Event) -> Self {
        Self {
            inner: Arc::new(RecordInner {
                id: event.id,
                event: OnceCell::new_with(Some(event)),
                content: OnceCell::new(),
            }),
        }
    }

    /// Returns the event identifier.
    #[must_use]
    pub fn id(&self) -> EventId {
        self.inner.id
    }

    /// Returns the payload if it has been fetched.
    #[must_use]
    pub fn event(&self) -> Option<&Event> {
        self.inner.event.get()
    }

    /// Returns `true` while the payload is unknown.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.inner.event.initialized()
    }

    /// Timestamp of the payload, if loaded.
    #[must_use]
    pub fn timestamp(&self) -> Option<i64> {
        self.event().map(|e| e.timestamp)
    }

    /// Completes a pending record with its payload.
    ///
    /// Returns `false` if the record was already loaded or the payload
    /// belongs to another identifier.
    pub fn fill(&self, event: Event) -> bool {
        if event.id != self.inner.id {
            return false;
        }
        self.inner.event.set(event).is_ok()
    }

    /// Returns the payload, fetching it from the log if still pending.
    ///
    /// Concurrent callers share a single fetch.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Log`] if the log cannot answer and
    /// [`JournalError::EventNotFound`] if it no longer knows the event.
    pub async fn fetch(&self, log: &dyn EventLog) -> Result<&Event, JournalError> {
        let id = self.inner.id;
        self.inner
            .event
            .get_or_try_init(|| async move {
                log.get_events(&[id])
                    .await?
                    .into_iter()
                    .find(|e| e.id == id)
                    .ok_or(JournalError::EventNotFound(id))
            })
            .await
    }

    /// Returns the content object for the primary subject, resolving it
    /// on first use.
    ///
    /// Pending records resolve to `None` without memoizing, so a later
    /// call after the payload arrives resolves normally.
    pub async fn content(&self, resolver: &ContentResolver) -> Option<Arc<ContentObject>> {
        let event = self.event()?;
        self.inner
            .content
            .get_or_init(|| resolver.resolve(event))
            .await
            .as_ref()
            .map(Arc::clone)
    }
}

impl PartialEq for EventRecord {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for EventRecord {}
