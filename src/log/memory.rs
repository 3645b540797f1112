//! In-process event log.
//!
//! [`MemoryEventLog`] keeps every event in an ordered map and fans
//! insertions and deletions out to the monitors whose range and templates
//! they match. Monitors whose subscription handle was dropped are pruned
//! on the next fan-out.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};

use super::{EventLog, LogError, LogNotification, LogSubscription};
use crate::domain::template::matches_any;
use crate::domain::{Event, EventId, EventTemplate, NewEvent, TimeRange, Timestamp};

#[derive(Debug)]
struct Monitor {
    id: u64,
    range: TimeRange,
    templates: Vec<EventTemplate>,
    sender: mpsc::UnboundedSender<LogNotification>,
}

impl Monitor {
    fn wants(&self, event: &Event) -> bool {
        self.range.contains(event.timestamp) && matches_any(&self.templates, event)
    }
}

#[derive(Debug, Default)]
struct LogState {
    events: BTreeMap<EventId, Event>,
    last_id: u32,
    monitors: Vec<Monitor>,
    last_monitor: u64,
}

/// Event log held entirely in memory.
#[derive(Debug)]
pub struct MemoryEventLog {
    state: RwLock<LogState>,
    available: AtomicBool,
    find_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MemoryEventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LogState::default()),
            available: AtomicBool::new(true),
            find_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Creates a log pre-populated with events, assigning ids `1..=n`.
    #[must_use]
    pub fn seeded(events: Vec<NewEvent>) -> Self {
        let mut state = LogState::default();
        for new in events {
            state.last_id = state.last_id.saturating_add(1);
            let id = EventId::new(state.last_id);
            state.events.insert(id, new.with_id(id));
        }
        Self {
            state: RwLock::new(state),
            ..Self::new()
        }
    }

    /// Simulates the log going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of identifier queries answered or refused so far.
    #[must_use]
    pub fn find_ids_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// Number of payload fetches answered or refused so far.
    #[must_use]
    pub fn get_events_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of monitors still registered.
    pub async fn monitor_count(&self) -> usize {
        self.state.read().await.monitors.len()
    }

    /// Number of events currently logged.
    pub async fn len(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Returns `true` if no events are logged.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.events.is_empty()
    }

    fn ensure_available(&self) -> Result<(), LogError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LogError::Unavailable("in-memory log switched off".to_string()))
        }
    }
}

impl Default for MemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Smallest range covering every timestamp, or `None` for no timestamps.
fn span(timestamps: impl IntoIterator<Item = Timestamp>) -> Option<TimeRange> {
    timestamps.into_iter().fold(None, |acc, ts| {
        let end = ts.saturating_add(1);
        Some(match acc {
            None => TimeRange::new(ts, end),
            Some(r) => TimeRange::new(r.start.min(ts), r.end.max(end)),
        })
    })
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn find_ids(
        &self,
        range: TimeRange,
        templates: &[EventTemplate],
    ) -> Result<Vec<EventId>, LogError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state
            .events
            .values()
            .filter(|e| range.contains(e.timestamp) && matches_any(templates, e))
            .map(|e| e.id)
            .collect())
    }

    async fn get_events(&self, ids: &[EventId]) -> Result<Vec<Event>, LogError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.events.get(id).cloned())
            .collect())
    }

    async fn subscribe(
        &self,
        range: TimeRange,
        templates: &[EventTemplate],
    ) -> Result<LogSubscription, LogError> {
        self.ensure_available()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.write().await;
        state.last_monitor = state.last_monitor.saturating_add(1);
        let id = state.last_monitor;
        state.monitors.push(Monitor {
            id,
            range,
            templates: templates.to_vec(),
            sender,
        });
        tracing::debug!(monitor = id, start = range.start, end = range.end, "monitor installed");
        Ok(LogSubscription::new(id, receiver))
    }

    async fn insert_events(&self, events: Vec<NewEvent>) -> Result<Vec<EventId>, LogError> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        let exhausted = || LogError::Rejected("event id space exhausted".to_string());
        let batch = u32::try_from(events.len()).map_err(|_| exhausted())?;
        state.last_id.checked_add(batch).ok_or_else(exhausted)?;

        let mut inserted = Vec::with_capacity(events.len());
        for new in events {
            state.last_id = state.last_id.saturating_add(1);
            let event = new.with_id(EventId::new(state.last_id));
            state.events.insert(event.id, event.clone());
            inserted.push(event);
        }

        state.monitors.retain(|monitor| {
            let matching: Vec<Event> = inserted
                .iter()
                .filter(|e| monitor.wants(e))
                .cloned()
                .collect();
            let Some(range) = span(matching.iter().map(|e| e.timestamp)) else {
                return !monitor.sender.is_closed();
            };
            let sent = monitor
                .sender
                .send(LogNotification::Inserted {
                    range,
                    events: matching,
                })
                .is_ok();
            if !sent {
                tracing::debug!(monitor = monitor.id, "pruning closed monitor");
            }
            sent
        });

        Ok(inserted.into_iter().map(|e| e.id).collect())
    }

    async fn delete(&self, ids: &[EventId]) -> Result<Vec<EventId>, LogError> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        let removed: Vec<Event> = ids
            .iter()
            .filter_map(|id| state.events.remove(id))
            .collect();

        state.monitors.retain(|monitor| {
            let matching: Vec<&Event> = removed.iter().filter(|e| monitor.wants(e)).collect();
            let Some(range) = span(matching.iter().map(|e| e.timestamp)) else {
                return !monitor.sender.is_closed();
            };
            monitor
                .sender
                .send(LogNotification::Deleted {
                    range,
                    ids: matching.iter().map(|e| e.id).collect(),
                })
                .is_ok()
        });

        Ok(removed.into_iter().map(|e| e.id).collect())
    }
}
