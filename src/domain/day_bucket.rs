//! All events of one calendar day, kept current by a live subscription.
//!
//! A [`DayBucket`] owns the id → [`EventRecord`] map for its day. The map
//! is the single source of truth for the day; consumers query it through
//! [`DayBucket::filter`] and [`DayBucket::time_map`] and re-query when an
//! [`UpdateCause`] notification arrives.
//!
//! # Population
//!
//! [`DayBucket::spawn`] starts one driver task per bucket. The driver
//! installs the live subscription first, then issues the one-shot
//! identifier query, hands the result to [`DayBucket::set_ids`], and from
//! then on applies live notifications strictly in arrival order. Payloads
//! for pending records are fetched in one batch on a separate task so the
//! driver keeps consuming notifications meanwhile.
//!
//! Log failures never escape the driver: the bucket simply stays (partly)
//! unpopulated and no notification fires for the failed batch.
//! [`DayBucket::reload`] retries everything that failed: the live
//! subscription, the identifier query and the payload fetch.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::{FixedOffset, NaiveDate};
use tokio::sync::{RwLock, broadcast};
use tokio::task::AbortHandle;

use super::event_bus::{EventBus, JournalEvent, UpdateCause};
use super::template::{Grouping, matches_any};
use super::{Event, EventId, EventRecord, EventTemplate, TimeRange, Timestamp};
use crate::error::JournalError;
use crate::log::{EventLog, LogNotification, LogSubscription};

/// Capacity of each bucket's own notification channel.
const BUCKET_BUS_CAPACITY: usize = 64;

/// One visit to a subject, as laid out on a timeline.
#[derive(Debug, Clone)]
pub struct TimeSpan {
    /// Event that opened the span (or the leave event for a span that
    /// started before the day did).
    pub record: EventRecord,
    /// When the span starts; the bucket start for spans opened earlier.
    pub start: Timestamp,
    /// Seconds until the matching leave event, `0` while still open.
    pub duration: i64,
    /// `true` once a leave event closed the span.
    pub closed: bool,
}

/// All spans of one subject URI within a day.
#[derive(Debug, Clone)]
pub struct TimeMapEntry {
    /// Subject URI shared by every span.
    pub uri: String,
    /// Spans in chronological order.
    pub spans: Vec<TimeSpan>,
}

/// Point-in-time counters of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySummary {
    /// Calendar day.
    pub date: NaiveDate,
    /// Boundaries of the day.
    pub range: TimeRange,
    /// Whether the initial identifier query has been processed.
    pub loaded: bool,
    /// Records held, pending ones included.
    pub record_count: usize,
    /// Records still waiting for their payload.
    pub pending_count: usize,
}

/// Events of one calendar day.
#[derive(Debug)]
pub struct DayBucket {
    date: NaiveDate,
    range: TimeRange,
    records: RwLock<BTreeMap<EventId, EventRecord>>,
    loaded: AtomicBool,
    log: Arc<dyn EventLog>,
    bus: EventBus,
    upstream: Option<EventBus>,
    /// `true` while a live subscription is installed or being installed.
    following: AtomicBool,
    driver: Mutex<Option<AbortHandle>>,
}

impl DayBucket {
    /// Creates an empty bucket without starting its population.
    ///
    /// Notifications go to the bucket's own bus and, when given, to
    /// `upstream` as well.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidDate`] if the day's boundaries cannot
    /// be computed.
    pub fn new(
        date: NaiveDate,
        tz: &FixedOffset,
        log: Arc<dyn EventLog>,
        upstream: Option<EventBus>,
    ) -> Result<Self, JournalError> {
        Ok(Self {
            date,
            range: TimeRange::for_day(date, tz)?,
            records: RwLock::new(BTreeMap::new()),
            loaded: AtomicBool::new(false),
            log,
            bus: EventBus::new(BUCKET_BUS_CAPACITY),
            upstream,
            following: AtomicBool::new(false),
            driver: Mutex::new(None),
        })
    }

    /// Creates a bucket and starts its driver task.
    ///
    /// Must be called from within a Tokio runtime. The driver stops when
    /// the bucket is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidDate`] if the day's boundaries cannot
    /// be computed.
    pub fn spawn(
        date: NaiveDate,
        tz: &FixedOffset,
        log: Arc<dyn EventLog>,
        upstream: Option<EventBus>,
    ) -> Result<Arc<Self>, JournalError> {
        let bucket = Arc::new(Self::new(date, tz, log, upstream)?);
        bucket.following.store(true, Ordering::SeqCst);
        let handle = tokio::spawn(drive(Arc::downgrade(&bucket)));
        bucket.replace_driver(handle.abort_handle());
        Ok(bucket)
    }

    /// Calendar day covered by this bucket.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// `[start, end)` boundaries of the day in epoch seconds.
    #[must_use]
    pub const fn range(&self) -> TimeRange {
        self.range
    }

    /// `true` once the initial identifier query has been processed, even if
    /// it returned nothing.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// `true` while the bucket holds a live subscription to the log.
    #[must_use]
    pub fn is_following(&self) -> bool {
        self.following.load(Ordering::SeqCst)
    }

    /// Subscribes to this bucket's change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<JournalEvent> {
        self.bus.subscribe()
    }

    /// Number of records, pending ones included.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns `true` if the bucket holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Number of records whose payload has not arrived yet.
    pub async fn pending_count(&self) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.is_pending())
            .count()
    }

    /// Counters for the current state of the bucket.
    pub async fn summary(&self) -> DaySummary {
        let records = self.records.read().await;
        DaySummary {
            date: self.date,
            range: self.range,
            loaded: self.is_loaded(),
            record_count: records.len(),
            pending_count: records.values().filter(|r| r.is_pending()).count(),
        }
    }

    /// Returns the record with the given id, pending or not.
    pub async fn get(&self, id: EventId) -> Option<EventRecord> {
        self.records.read().await.get(&id).cloned()
    }

    /// Loaded records in chronological order.
    pub async fn records(&self) -> Vec<EventRecord> {
        let mut records: Vec<EventRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| !r.is_pending())
            .cloned()
            .collect();
        records.sort_by_key(chronological);
        records
    }

    /// Handles the result of the initial identifier query.
    ///
    /// Creates a pending record for every unknown id (duplicates collapse),
    /// marks the bucket loaded, emits one notification for the whole batch
    /// and schedules a single payload fetch covering every pending record,
    /// including ones left over from an earlier failed fetch. Returns the
    /// number of records created.
    pub async fn set_ids(self: &Arc<Self>, ids: &[EventId]) -> usize {
        let (created, pending, count) = {
            let mut records = self.records.write().await;
            let mut created = 0_usize;
            for id in ids {
                if let Entry::Vacant(slot) = records.entry(*id) {
                    slot.insert(EventRecord::pending(*id));
                    created += 1;
                }
            }
            let pending = records.values().filter(|r| r.is_pending()).count();
            (created, pending, records.len())
        };

        self.loaded.store(true, Ordering::SeqCst);
        self.notify(UpdateCause::InitialIds, count);

        if pending > 0 {
            let bucket = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = bucket.fetch_pending().await {
                    tracing::warn!(date = %bucket.date, %err, "payload fetch failed; records stay pending");
                }
            });
        }
        created
    }

    /// Fetches payloads for every pending record in one batch.
    ///
    /// Payloads that fall outside the day drop their record. Emits one
    /// notification if anything changed. Returns the number of records
    /// that were completed.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Log`] if the log cannot answer; the records
    /// stay pending.
    pub async fn fetch_pending(&self) -> Result<usize, JournalError> {
        let pending: Vec<EventId> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.is_pending())
            .map(EventRecord::id)
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let events = self.log.get_events(&pending).await?;

        let (filled, dropped, count) = {
            let mut records = self.records.write().await;
            let mut filled = 0_usize;
            let mut dropped = 0_usize;
            for event in events {
                if !self.range.contains(event.timestamp) {
                    if records.remove(&event.id).is_some() {
                        dropped += 1;
                    }
                    continue;
                }
                if let Some(record) = records.get(&event.id)
                    && record.fill(event)
                {
                    filled += 1;
                }
            }
            (filled, dropped, records.len())
        };

        tracing::debug!(date = %self.date, requested = pending.len(), filled, dropped, "payloads fetched");
        if filled + dropped > 0 {
            self.notify(UpdateCause::PayloadsFetched, count);
        }
        Ok(filled)
    }

    /// Handles events pushed by the live subscription.
    ///
    /// Unknown ids become loaded records straight from the pushed payload;
    /// a pending record with the same id is completed instead. Events
    /// outside the day and already loaded ids are ignored. Emits one
    /// notification for the batch if anything changed. Returns the number
    /// of records added or completed.
    pub async fn insert(&self, events: Vec<Event>) -> usize {
        let (changed, count) = {
            let mut records = self.records.write().await;
            let mut changed = 0_usize;
            for event in events {
                if !self.range.contains(event.timestamp) {
                    tracing::debug!(date = %self.date, id = %event.id, "ignoring event outside day");
                    continue;
                }
                match records.entry(event.id) {
                    Entry::Vacant(slot) => {
                        slot.insert(EventRecord::loaded(event));
                        changed += 1;
                    }
                    Entry::Occupied(slot) => {
                        if slot.get().fill(event) {
                            changed += 1;
                        }
                    }
                }
            }
            (changed, records.len())
        };

        if changed > 0 {
            self.notify(UpdateCause::Inserted, count);
        }
        changed
    }

    /// Handles deletions reported by the live subscription.
    ///
    /// Unknown ids are ignored. Emits one notification only if at least
    /// one record was removed. Returns the number removed.
    pub async fn remove(&self, ids: &[EventId]) -> usize {
        let (removed, count) = {
            let mut records = self.records.write().await;
            let removed = ids.iter().filter(|id| records.remove(*id).is_some()).count();
            (removed, records.len())
        };

        if removed > 0 {
            self.notify(UpdateCause::Removed, count);
        }
        removed
    }

    /// Applies one live-subscription notification.
    pub async fn apply(&self, notification: LogNotification) {
        match notification {
            LogNotification::Inserted { range, events } => {
                if range.overlaps(&self.range) {
                    self.insert(events).await;
                }
            }
            LogNotification::Deleted { range, ids } => {
                if range.overlaps(&self.range) {
                    self.remove(&ids).await;
                }
            }
        }
    }

    /// Re-issues the initial identifier query, e.g. after the log was
    /// unavailable when the bucket was created.
    ///
    /// Installs a fresh live subscription first if the bucket has none,
    /// and refetches payloads of records still pending. Returns the number
    /// of records created.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Log`] if the log still cannot answer.
    pub async fn reload(self: &Arc<Self>) -> Result<usize, JournalError> {
        self.resubscribe().await;
        let ids = self.log.find_ids(self.range, &[]).await?;
        Ok(self.set_ids(&ids).await)
    }

    /// Starts a new follower task unless a subscription is already live.
    async fn resubscribe(self: &Arc<Self>) {
        if self
            .following
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        match self.log.subscribe(self.range, &[]).await {
            Ok(subscription) => {
                let handle = tokio::spawn(follow(Arc::downgrade(self), subscription));
                self.replace_driver(handle.abort_handle());
                tracing::info!(date = %self.date, "live subscription restored");
            }
            Err(err) => {
                self.following.store(false, Ordering::SeqCst);
                tracing::warn!(date = %self.date, %err, "live subscription still failing");
            }
        }
    }

    fn replace_driver(&self, handle: AbortHandle) {
        if let Ok(mut driver) = self.driver.lock()
            && let Some(previous) = driver.replace(handle)
        {
            previous.abort();
        }
    }

    /// Loaded records matching any template (all of them when `templates`
    /// is empty), collapsed according to `grouping`.
    pub async fn filter(&self, templates: &[EventTemplate], grouping: Grouping) -> Vec<EventRecord> {
        let matches: Vec<EventRecord> = self
            .records()
            .await
            .into_iter()
            .filter(|r| r.event().is_some_and(|e| matches_any(templates, e)))
            .collect();

        match grouping {
            Grouping::None => matches,
            Grouping::MostRecentSubjects => {
                let mut latest: Vec<EventRecord> =
                    group_by_uri(&matches).into_values().map(|(r, _)| r).collect();
                latest.sort_by_key(|r| std::cmp::Reverse(chronological(r)));
                latest
            }
            Grouping::MostPopularSubjects => {
                let mut groups: Vec<(EventRecord, usize)> =
                    group_by_uri(&matches).into_values().collect();
                groups.sort_by(|(a, a_hits), (b, b_hits)| {
                    b_hits
                        .cmp(a_hits)
                        .then_with(|| chronological(b).cmp(&chronological(a)))
                });
                groups.into_iter().map(|(r, _)| r).collect()
            }
        }
    }

    /// Pairs access events with the leave event that follows them for the
    /// same subject URI.
    ///
    /// A span stays open (duration `0`) until a leave event closes it. A
    /// leave event with no earlier span for its URI opens a span at the
    /// start of the day. A leave event after an already closed span is
    /// ignored. Entries are ordered by the start of their first span.
    pub async fn time_map(&self) -> Vec<TimeMapEntry> {
        let mut groups: HashMap<String, Vec<TimeSpan>> = HashMap::new();

        for record in self.records().await {
            let Some(event) = record.event() else {
                continue;
            };
            let ts = event.timestamp;
            let uri = event.primary_uri().unwrap_or_default().to_string();
            let leave = event.is_leave();
            let spans = groups.entry(uri).or_default();

            if !leave {
                spans.push(TimeSpan {
                    record,
                    start: ts,
                    duration: 0,
                    closed: false,
                });
                continue;
            }
            match spans.last_mut() {
                Some(open) if !open.closed => {
                    open.duration = ts.saturating_sub(open.start);
                    open.closed = true;
                }
                Some(_) => {}
                None => spans.push(TimeSpan {
                    record,
                    start: self.range.start,
                    duration: ts.saturating_sub(self.range.start),
                    closed: true,
                }),
            }
        }

        let mut entries: Vec<TimeMapEntry> = groups
            .into_iter()
            .map(|(uri, spans)| TimeMapEntry { uri, spans })
            .collect();
        entries.sort_by(|a, b| {
            let a_start = a.spans.first().map(|s| s.start);
            let b_start = b.spans.first().map(|s| s.start);
            a_start.cmp(&b_start).then_with(|| a.uri.cmp(&b.uri))
        });
        entries
    }

    fn notify(&self, cause: UpdateCause, record_count: usize) {
        let event = JournalEvent::day_updated(self.date, cause, record_count);
        if let Some(upstream) = &self.upstream {
            upstream.publish(event.clone());
        }
        self.bus.publish(event);
        tracing::trace!(date = %self.date, ?cause, record_count, "day updated");
    }
}

impl Drop for DayBucket {
    fn drop(&mut self) {
        if let Ok(driver) = self.driver.get_mut()
            && let Some(handle) = driver.take()
        {
            handle.abort();
        }
    }
}

/// Sort key giving chronological order with ties broken by id.
fn chronological(record: &EventRecord) -> (Timestamp, EventId) {
    (record.timestamp().unwrap_or(Timestamp::MIN), record.id())
}

/// Collapses records per primary subject URI. Records must be in
/// chronological order; the last one seen for a URI wins. Also counts
/// how many records each URI had.
fn group_by_uri(records: &[EventRecord]) -> HashMap<String, (EventRecord, usize)> {
    let mut groups: HashMap<String, (EventRecord, usize)> = HashMap::new();
    for record in records {
        let uri = record
            .event()
            .and_then(Event::primary_uri)
            .unwrap_or_default()
            .to_string();
        groups
            .entry(uri)
            .and_modify(|(latest, hits)| {
                *latest = record.clone();
                *hits += 1;
            })
            .or_insert_with(|| (record.clone(), 1));
    }
    groups
}

/// Population task of one bucket. Holds only a weak reference so that
/// dropping the bucket ends it.
async fn drive(bucket: Weak<DayBucket>) {
    let Some((log, range, date)) = bucket
        .upgrade()
        .map(|b| (Arc::clone(&b.log), b.range, b.date))
    else {
        return;
    };

    let subscription = match log.subscribe(range, &[]).await {
        Ok(subscription) => Some(subscription),
        Err(err) => {
            tracing::warn!(%date, %err, "live subscription failed; day follows changes after a reload");
            if let Some(bucket) = bucket.upgrade() {
                bucket.following.store(false, Ordering::SeqCst);
            }
            None
        }
    };

    match log.find_ids(range, &[]).await {
        Ok(ids) => {
            let Some(bucket) = bucket.upgrade() else {
                return;
            };
            let created = bucket.set_ids(&ids).await;
            tracing::debug!(%date, returned = ids.len(), created, "initial ids processed");
        }
        Err(err) => {
            tracing::warn!(%date, %err, "initial query failed; day stays unpopulated");
        }
    }

    if let Some(subscription) = subscription {
        follow(bucket, subscription).await;
    }
}

/// Applies live notifications in arrival order until the log hangs up or
/// the bucket is dropped.
async fn follow(bucket: Weak<DayBucket>, mut subscription: LogSubscription) {
    while let Some(notification) = subscription.recv().await {
        let Some(bucket) = bucket.upgrade() else {
            return;
        };
        bucket.apply(notification).await;
    }
    if let Some(bucket) = bucket.upgrade() {
        bucket.following.store(false, Ordering::SeqCst);
        tracing::debug!(date = %bucket.date, "day driver stopped");
    }
}
