//! Broadcast channel for journal change notifications.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every day
//! bucket owns one for its own observers and forwards the same
//! [`JournalEvent`] to its store's bus, so a single subscription on the
//! store sees every day. Dropping a receiver unsubscribes it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Why a day bucket changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateCause {
    /// The initial identifier query for the day was processed.
    InitialIds,
    /// Payloads for pending records arrived.
    PayloadsFetched,
    /// The live subscription pushed new events.
    Inserted,
    /// The live subscription reported deleted events.
    Removed,
}

/// Notification emitted by day buckets and the event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum JournalEvent {
    /// The contents of a day changed; consumers should re-query it.
    DayUpdated {
        /// Calendar day that changed.
        date: NaiveDate,
        /// What triggered the change.
        cause: UpdateCause,
        /// Number of records held after the change.
        record_count: usize,
        /// When the notification was emitted.
        timestamp: DateTime<Utc>,
    },

    /// A day bucket was dropped from the store.
    DayEvicted {
        /// Calendar day that was evicted.
        date: NaiveDate,
        /// When the eviction happened.
        timestamp: DateTime<Utc>,
    },
}

impl JournalEvent {
    /// Builds a [`JournalEvent::DayUpdated`] stamped with the current time.
    #[must_use]
    pub fn day_updated(date: NaiveDate, cause: UpdateCause, record_count: usize) -> Self {
        Self::DayUpdated {
            date,
            cause,
            record_count,
            timestamp: Utc::now(),
        }
    }

    /// Returns the day this notification is about.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::DayUpdated { date, .. } | Self::DayEvicted { date, .. } => *date,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::DayUpdated { .. } => "day_updated",
            Self::DayEvicted { .. } => "day_evicted",
        }
    }
}

/// Broadcast bus for [`JournalEvent`]s.
///
/// When the ring buffer is full, the oldest notifications are dropped for
/// lagging receivers. Consumers only ever need the latest state of a day,
/// so a lagged receiver simply re-queries.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<JournalEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a notification to all subscribers.
    ///
    /// Returns the number of receivers that received it. If there are no
    /// active receivers, the notification is silently dropped.
    pub fn publish(&self, event: JournalEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver for all future notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<JournalEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        let Some(d) = NaiveDate::from_ymd_opt(2024, 1, 15) else {
            panic!("valid date");
        };
        d
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(16);
        let count = bus.publish(JournalEvent::day_updated(day(), UpdateCause::Inserted, 1));
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn subscriber_receives_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(JournalEvent::day_updated(day(), UpdateCause::InitialIds, 3));

        let Ok(event) = rx.recv().await else {
            panic!("expected to receive event");
        };
        assert_eq!(event.date(), day());
        assert_eq!(event.event_type_str(), "day_updated");
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::new(16);
        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        drop(rx1);
        assert_eq!(bus.receiver_count(), 1);
    }

    #[test]
    fn serializes_with_tag() {
        let json = serde_json::to_string(&JournalEvent::DayEvicted {
            date: day(),
            timestamp: Utc::now(),
        })
        .unwrap_or_default();
        assert!(json.contains("\"event_type\":\"day_evicted\""));
        assert!(json.contains("2024-01-15"));
    }
}
