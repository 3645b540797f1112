//! Contract with the external event log.
//!
//! The journal never stores events durably itself. It asks an
//! [`EventLog`] for identifiers and payloads, and registers live
//! subscriptions that push insertions and deletions as they happen.
//! [`MemoryEventLog`] is a complete in-process implementation used by the
//! server binary and the tests.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{Event, EventId, EventTemplate, NewEvent, TimeRange};

pub use memory::MemoryEventLog;

/// Failures reported by the event log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    /// The log could not be reached or did not answer.
    #[error("event log unavailable: {0}")]
    Unavailable(String),

    /// The log refused the request.
    #[error("event log rejected request: {0}")]
    Rejected(String),
}

/// A change pushed by a live subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogNotification {
    /// Events matching the subscription were logged.
    Inserted {
        /// Time range spanned by the inserted events.
        range: TimeRange,
        /// Full payloads of the inserted events.
        events: Vec<Event>,
    },
    /// Events matching the subscription were deleted.
    Deleted {
        /// Time range spanned by the deleted events.
        range: TimeRange,
        /// Identifiers of the deleted events.
        ids: Vec<EventId>,
    },
}

/// Handle for a live subscription.
///
/// Notifications are delivered in the order the log emits them. Dropping
/// the handle ends the subscription.
#[derive(Debug)]
pub struct LogSubscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<LogNotification>,
}

impl LogSubscription {
    /// Wraps the receiving half of a subscription channel.
    #[must_use]
    pub fn new(id: u64, receiver: mpsc::UnboundedReceiver<LogNotification>) -> Self {
        Self { id, receiver }
    }

    /// Identifier the log assigned to this subscription.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next notification; `None` once the log hung up.
    pub async fn recv(&mut self) -> Option<LogNotification> {
        self.receiver.recv().await
    }
}

/// Asynchronous operations the journal needs from the event log.
#[async_trait]
pub trait EventLog: Send + Sync + fmt::Debug {
    /// Returns identifiers of events inside `range` matching any template.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] if the log cannot answer.
    async fn find_ids(
        &self,
        range: TimeRange,
        templates: &[EventTemplate],
    ) -> Result<Vec<EventId>, LogError>;

    /// Returns payloads for the given identifiers. Unknown identifiers are
    /// skipped, so the result may be shorter than the request.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] if the log cannot answer.
    async fn get_events(&self, ids: &[EventId]) -> Result<Vec<Event>, LogError>;

    /// Registers a live monitor for events inside `range` matching any
    /// template.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] if the monitor cannot be installed.
    async fn subscribe(
        &self,
        range: TimeRange,
        templates: &[EventTemplate],
    ) -> Result<LogSubscription, LogError>;

    /// Logs new events and returns their assigned identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] if the events cannot be stored.
    async fn insert_events(&self, events: Vec<NewEvent>) -> Result<Vec<EventId>, LogError>;

    /// Deletes events and returns the identifiers that actually existed.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] if the deletion cannot be performed.
    async fn delete(&self, ids: &[EventId]) -> Result<Vec<EventId>, LogError>;
}
