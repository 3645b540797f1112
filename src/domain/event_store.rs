//! Date-indexed registry of day buckets.
//!
//! [`EventStore`] creates a [`DayBucket`] the first time a date is asked
//! for and hands out the same bucket on every later request. Buckets are
//! stored behind a [`tokio::sync::RwLock`] so lookups run concurrently and
//! only bucket creation takes the write lock.
//!
//! Every bucket forwards its notifications to the store's [`EventBus`],
//! so one subscription covers all days.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Days, FixedOffset, NaiveDate, Utc};
use tokio::sync::{RwLock, broadcast};

use super::event_bus::{EventBus, JournalEvent};
use super::{DayBucket, EventId, EventRecord};
use crate::error::JournalError;
use crate::log::EventLog;

/// Format accepted by [`EventStore::parse_date`].
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Owner of every day bucket.
#[derive(Debug)]
pub struct EventStore {
    days: RwLock<BTreeMap<NaiveDate, Arc<DayBucket>>>,
    log: Arc<dyn EventLog>,
    tz: FixedOffset,
    bus: EventBus,
}

impl EventStore {
    /// Creates an empty store.
    ///
    /// Day boundaries are computed in `tz`; bucket notifications are
    /// re-published on `bus`.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog>, tz: FixedOffset, bus: EventBus) -> Self {
        Self {
            days: RwLock::new(BTreeMap::new()),
            log,
            tz,
            bus,
        }
    }

    /// Returns the bucket for `date`, creating it and starting its
    /// population if absent.
    ///
    /// Population failures never surface here: the bucket stays registered
    /// and empty.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidDate`] if the day's boundaries cannot
    /// be computed.
    pub async fn get_or_create(&self, date: NaiveDate) -> Result<Arc<DayBucket>, JournalError> {
        if let Some(bucket) = self.days.read().await.get(&date) {
            return Ok(Arc::clone(bucket));
        }

        let mut days = self.days.write().await;
        if let Some(bucket) = days.get(&date) {
            return Ok(Arc::clone(bucket));
        }
        let bucket = DayBucket::spawn(
            date,
            &self.tz,
            Arc::clone(&self.log),
            Some(self.bus.clone()),
        )?;
        days.insert(date, Arc::clone(&bucket));
        tracing::debug!(%date, buckets = days.len(), "day bucket created");
        Ok(bucket)
    }

    /// Returns the bucket for `date` only if it already exists.
    pub async fn get(&self, date: NaiveDate) -> Option<Arc<DayBucket>> {
        self.days.read().await.get(&date).map(Arc::clone)
    }

    /// Bucket for the day after `date`.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidDate`] past the last representable
    /// date.
    pub async fn next(&self, date: NaiveDate) -> Result<Arc<DayBucket>, JournalError> {
        let next = date
            .succ_opt()
            .ok_or_else(|| JournalError::InvalidDate(format!("no day after {date}")))?;
        self.get_or_create(next).await
    }

    /// Bucket for the day before `date`.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidDate`] before the first representable
    /// date.
    pub async fn previous(&self, date: NaiveDate) -> Result<Arc<DayBucket>, JournalError> {
        let previous = date
            .pred_opt()
            .ok_or_else(|| JournalError::InvalidDate(format!("no day before {date}")))?;
        self.get_or_create(previous).await
    }

    /// Creates buckets for `today` and the `days - 1` days before it.
    /// Returns how many buckets were newly created.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidDate`] if the window reaches past the
    /// first representable date.
    pub async fn prewarm(&self, today: NaiveDate, days: u32) -> Result<usize, JournalError> {
        let before = self.days.read().await.len();
        let mut date = today;
        for remaining in (0..days).rev() {
            self.get_or_create(date).await?;
            if remaining > 0 {
                date = date.pred_opt().ok_or_else(|| {
                    JournalError::InvalidDate(format!("no day before {date}"))
                })?;
            }
        }
        let created = self.days.read().await.len().saturating_sub(before);
        tracing::info!(%today, days, created, "prewarmed day buckets");
        Ok(created)
    }

    /// Every bucket, in date order.
    pub async fn days(&self) -> Vec<Arc<DayBucket>> {
        self.days.read().await.values().map(Arc::clone).collect()
    }

    /// Existing buckets with `from <= date <= to`, in date order.
    pub async fn days_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<Arc<DayBucket>> {
        if from > to {
            return Vec::new();
        }
        self.days
            .read()
            .await
            .range(from..=to)
            .map(|(_, bucket)| Arc::clone(bucket))
            .collect()
    }

    /// Number of buckets.
    pub async fn len(&self) -> usize {
        self.days.read().await.len()
    }

    /// Returns `true` if no bucket exists yet.
    pub async fn is_empty(&self) -> bool {
        self.days.read().await.is_empty()
    }

    /// Sum of record counts over all buckets, pending records included.
    pub async fn total_count(&self) -> usize {
        let mut total = 0_usize;
        for bucket in self.days().await {
            total = total.saturating_add(bucket.len().await);
        }
        total
    }

    /// Looks an event up in every bucket.
    pub async fn find_record(&self, id: EventId) -> Option<EventRecord> {
        match self.bucket_of(id).await {
            Some(bucket) => bucket.get(id).await,
            None => None,
        }
    }

    /// Bucket currently holding the event, pending or not.
    pub async fn bucket_of(&self, id: EventId) -> Option<Arc<DayBucket>> {
        for bucket in self.days().await {
            if bucket.get(id).await.is_some() {
                return Some(bucket);
            }
        }
        None
    }

    /// Asks the log to delete events. Buckets drop the records once the
    /// log's deletion notification arrives. Returns the ids the log
    /// actually deleted.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Log`] if the log refuses or cannot be
    /// reached.
    pub async fn delete_events(&self, ids: &[EventId]) -> Result<Vec<EventId>, JournalError> {
        let deleted = self.log.delete(ids).await?;
        tracing::info!(requested = ids.len(), deleted = deleted.len(), "deletion forwarded to log");
        Ok(deleted)
    }

    /// Drops every bucket more than `radius` days away from `center`.
    ///
    /// Never called implicitly. Evicted days are rebuilt from the log on
    /// their next request. Returns the evicted dates.
    pub async fn evict_outside(&self, center: NaiveDate, radius: u32) -> Vec<NaiveDate> {
        let low = center.checked_sub_days(Days::new(u64::from(radius)));
        let high = center.checked_add_days(Days::new(u64::from(radius)));

        let evicted: Vec<NaiveDate> = {
            let mut days = self.days.write().await;
            let outside: Vec<NaiveDate> = days
                .keys()
                .filter(|d| low.is_some_and(|low| **d < low) || high.is_some_and(|high| **d > high))
                .copied()
                .collect();
            for date in &outside {
                days.remove(date);
            }
            outside
        };

        for date in &evicted {
            self.bus.publish(JournalEvent::DayEvicted {
                date: *date,
                timestamp: Utc::now(),
            });
        }
        if !evicted.is_empty() {
            tracing::info!(%center, radius, evicted = evicted.len(), "day buckets evicted");
        }
        evicted
    }

    /// Parses a `YYYY-MM-DD` date. `today` and `yesterday` are resolved in
    /// the store's timezone.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidDate`] for anything else.
    pub fn parse_date(&self, raw: &str) -> Result<NaiveDate, JournalError> {
        match raw {
            "today" => Ok(self.today()),
            "yesterday" => self
                .today()
                .pred_opt()
                .ok_or_else(|| JournalError::InvalidDate(raw.to_string())),
            _ => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map_err(|e| JournalError::InvalidDate(format!("{raw}: {e}"))),
        }
    }

    /// Current date in the store's timezone.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    /// Subscribes to notifications from every bucket.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<JournalEvent> {
        self.bus.subscribe()
    }

    /// Store-level notification bus.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Backing event log.
    #[must_use]
    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }

    /// Timezone used for day boundaries.
    #[must_use]
    pub const fn timezone(&self) -> &FixedOffset {
        &self.tz
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::event::interpretation;
    use crate::domain::{Grouping, NewEvent, Subject, Timestamp, UpdateCause};
    use crate::log::MemoryEventLog;

    /// 2024-01-15T00:00:00Z
    const JAN_15: Timestamp = 1_705_276_800;

    fn utc() -> FixedOffset {
        let Some(tz) = FixedOffset::east_opt(0) else {
            panic!("valid offset");
        };
        tz
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        let Some(date) = NaiveDate::from_ymd_opt(y, m, d) else {
            panic!("valid date");
        };
        date
    }

    fn access(ts: Timestamp, uri: &str) -> NewEvent {
        NewEvent {
            timestamp: ts,
            interpretation: interpretation::ACCESS_EVENT.to_string(),
            manifestation: String::new(),
            actor: "application://gedit.desktop".to_string(),
            subjects: vec![Subject::new(uri)],
        }
    }

    fn store_over(log: &Arc<MemoryEventLog>) -> EventStore {
        EventStore::new(Arc::clone(log) as Arc<dyn EventLog>, utc(), EventBus::new(64))
    }

    async fn wait_for(
        rx: &mut broadcast::Receiver<JournalEvent>,
        wanted: UpdateCause,
    ) -> JournalEvent {
        loop {
            let Ok(Ok(event)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await
            else {
                panic!("no {wanted:?} notification arrived");
            };
            if matches!(event, JournalEvent::DayUpdated { cause, .. } if cause == wanted) {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let log = Arc::new(MemoryEventLog::new());
        let store = store_over(&log);
        let mut rx = store.subscribe();

        let Ok(first) = store.get_or_create(date(2024, 1, 15)).await else {
            panic!("creation failed");
        };
        wait_for(&mut rx, UpdateCause::InitialIds).await;
        let Ok(second) = store.get_or_create(date(2024, 1, 15)).await else {
            panic!("lookup failed");
        };

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len().await, 1);
        assert_eq!(log.find_ids_calls(), 1);
    }

    #[tokio::test]
    async fn next_and_previous_move_one_day() {
        let store = store_over(&Arc::new(MemoryEventLog::new()));
        let day = date(2024, 3, 1);

        let Ok(next) = store.next(day).await else {
            panic!("next failed");
        };
        let Ok(previous) = store.previous(day).await else {
            panic!("previous failed");
        };
        assert_eq!(next.date(), date(2024, 3, 2));
        assert_eq!(previous.date(), date(2024, 2, 29));
        assert!(store.get(day).await.is_none());
    }

    #[tokio::test]
    async fn next_past_the_last_date_is_invalid() {
        let store = store_over(&Arc::new(MemoryEventLog::new()));
        let result = store.next(NaiveDate::MAX).await;
        assert!(matches!(result, Err(JournalError::InvalidDate(_))));
    }

    #[tokio::test]
    async fn unavailable_log_leaves_bucket_registered_and_empty() {
        let log = Arc::new(MemoryEventLog::new());
        log.set_available(false);
        let store = store_over(&log);

        let Ok(bucket) = store.get_or_create(date(2024, 1, 15)).await else {
            panic!("creation must not fail on log outage");
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!bucket.is_loaded());
        assert!(bucket.is_empty().await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn initial_load_then_live_removal() {
        let log = Arc::new(MemoryEventLog::seeded(vec![
            access(JAN_15 + 100, "file:///notes.txt"),
            access(JAN_15 + 200, "https://example.org"),
            access(JAN_15 + 300, "file:///report.odt"),
        ]));
        let store = store_over(&log);
        let mut rx = store.subscribe();

        let Ok(bucket) = store.get_or_create(date(2024, 1, 15)).await else {
            panic!("creation failed");
        };
        wait_for(&mut rx, UpdateCause::PayloadsFetched).await;
        assert_eq!(bucket.filter(&[], Grouping::None).await.len(), 3);

        let Ok(deleted) = store.delete_events(&[EventId::new(2)]).await else {
            panic!("delete failed");
        };
        assert_eq!(deleted, vec![EventId::new(2)]);
        wait_for(&mut rx, UpdateCause::Removed).await;

        let ids: Vec<u32> = bucket
            .filter(&[], Grouping::None)
            .await
            .iter()
            .map(|r| r.id().get())
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(store.total_count().await, 2);
    }

    #[tokio::test]
    async fn live_insert_lands_in_the_right_day() {
        let log = Arc::new(MemoryEventLog::new());
        let store = store_over(&log);
        let mut rx = store.subscribe();
        let (Ok(jan_15), Ok(jan_16)) = (
            store.get_or_create(date(2024, 1, 15)).await,
            store.get_or_create(date(2024, 1, 16)).await,
        ) else {
            panic!("creation failed");
        };
        wait_for(&mut rx, UpdateCause::InitialIds).await;
        wait_for(&mut rx, UpdateCause::InitialIds).await;

        let _ = log
            .insert_events(vec![access(JAN_15 + 86_400 + 60, "file:///late.txt")])
            .await;
        let JournalEvent::DayUpdated { date: updated, .. } =
            wait_for(&mut rx, UpdateCause::Inserted).await
        else {
            panic!("expected day update");
        };

        assert_eq!(updated, date(2024, 1, 16));
        assert_eq!(jan_16.len().await, 1);
        assert!(jan_15.is_empty().await);
        assert!(store.find_record(EventId::new(1)).await.is_some());
    }

    #[tokio::test]
    async fn prewarm_creates_a_window_ending_today() {
        let store = store_over(&Arc::new(MemoryEventLog::new()));
        let Ok(created) = store.prewarm(date(2024, 1, 15), 7).await else {
            panic!("prewarm failed");
        };
        assert_eq!(created, 7);

        let dates: Vec<NaiveDate> = store.days().await.iter().map(|b| b.date()).collect();
        assert_eq!(dates.first(), Some(&date(2024, 1, 9)));
        assert_eq!(dates.last(), Some(&date(2024, 1, 15)));

        let Ok(again) = store.prewarm(date(2024, 1, 15), 7).await else {
            panic!("prewarm failed");
        };
        assert_eq!(again, 0);
        assert_eq!(
            store
                .days_between(date(2024, 1, 10), date(2024, 1, 12))
                .await
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn evict_outside_drops_distant_days() {
        let store = store_over(&Arc::new(MemoryEventLog::new()));
        let _ = store.prewarm(date(2024, 1, 15), 10).await;
        let mut rx = store.subscribe();

        let evicted = store.evict_outside(date(2024, 1, 15), 2).await;

        assert_eq!(evicted.len(), 7);
        assert_eq!(store.len().await, 3);
        let mut notices = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let JournalEvent::DayEvicted { date, .. } = event {
                notices.push(date);
            }
        }
        assert_eq!(notices.len(), 7);
        assert_eq!(notices.first(), Some(&date(2024, 1, 6)));
    }

    #[test]
    fn parse_date_accepts_iso_and_keywords() {
        let store = store_over(&Arc::new(MemoryEventLog::new()));
        let Ok(parsed) = store.parse_date("2024-01-15") else {
            panic!("parse failed");
        };
        assert_eq!(parsed, date(2024, 1, 15));
        assert_eq!(store.parse_date("today").ok(), Some(store.today()));
        tokio_test::assert_ok!(store.parse_date("yesterday"));
        tokio_test::assert_err!(store.parse_date("2024-02-30"));
        assert!(matches!(
            store.parse_date("15/01/2024"),
            Err(JournalError::InvalidDate(_))
        ));
    }
}
