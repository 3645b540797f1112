//! Journal service: the operations the REST and WebSocket surfaces share.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::content::{ContentObject, ContentResolver};
use crate::domain::{
    DaySummary, EventBus, EventId, EventRecord, EventStore, EventTemplate, Grouping, NewEvent,
    TimeMapEntry,
};
use crate::error::JournalError;

/// Longest date range [`JournalService::list_days`] accepts, in days.
pub const MAX_DAY_SPAN: i64 = 366;

/// Orchestration layer over the [`EventStore`] and [`ContentResolver`].
///
/// Stateless coordinator: every read goes through the store (creating day
/// buckets on demand) and every mutation is forwarded to the backing log,
/// whose notifications then update the buckets.
#[derive(Debug, Clone)]
pub struct JournalService {
    store: Arc<EventStore>,
    resolver: Arc<ContentResolver>,
}

impl JournalService {
    /// Creates a new `JournalService`.
    #[must_use]
    pub fn new(store: Arc<EventStore>, resolver: Arc<ContentResolver>) -> Self {
        Self { store, resolver }
    }

    /// Returns the inner [`EventStore`].
    #[must_use]
    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// Returns the inner [`ContentResolver`].
    #[must_use]
    pub fn resolver(&self) -> &Arc<ContentResolver> {
        &self.resolver
    }

    /// Returns the store-level [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        self.store.event_bus()
    }

    /// Parses a date as accepted by [`EventStore::parse_date`].
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidDate`] for malformed input.
    pub fn parse_date(&self, raw: &str) -> Result<NaiveDate, JournalError> {
        self.store.parse_date(raw)
    }

    /// Current state of one day, creating its bucket if needed.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidDate`] if the day cannot be bucketed.
    pub async fn day_summary(&self, date: NaiveDate) -> Result<DaySummary, JournalError> {
        let bucket = self.store.get_or_create(date).await?;
        Ok(bucket.summary().await)
    }

    /// Summaries for every day in `from..=to`, creating buckets as needed.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidRequest`] if `from` is after `to` or
    /// the range spans more than [`MAX_DAY_SPAN`] days.
    pub async fn list_days(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DaySummary>, JournalError> {
        let span = to.signed_duration_since(from).num_days();
        if span < 0 {
            return Err(JournalError::InvalidRequest(format!(
                "range start {from} is after end {to}"
            )));
        }
        if span >= MAX_DAY_SPAN {
            return Err(JournalError::InvalidRequest(format!(
                "range spans {} days, at most {MAX_DAY_SPAN} allowed",
                span.saturating_add(1)
            )));
        }

        let mut summaries = Vec::new();
        for date in from.iter_days().take_while(|d| *d <= to) {
            summaries.push(self.day_summary(date).await?);
        }
        Ok(summaries)
    }

    /// Loaded records of one day matching any template, grouped.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidDate`] if the day cannot be bucketed.
    pub async fn filter_day(
        &self,
        date: NaiveDate,
        templates: &[EventTemplate],
        grouping: Grouping,
    ) -> Result<Vec<EventRecord>, JournalError> {
        let bucket = self.store.get_or_create(date).await?;
        let records = bucket.filter(templates, grouping).await;
        tracing::debug!(%date, templates = templates.len(), %grouping, matches = records.len(), "day filtered");
        Ok(records)
    }

    /// Timeline view of one day.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidDate`] if the day cannot be bucketed.
    pub async fn time_map(&self, date: NaiveDate) -> Result<Vec<TimeMapEntry>, JournalError> {
        let bucket = self.store.get_or_create(date).await?;
        Ok(bucket.time_map().await)
    }

    /// Re-runs the initial query of a day, e.g. after a log outage.
    /// Returns the number of records created.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Log`] if the log still cannot answer.
    pub async fn reload_day(&self, date: NaiveDate) -> Result<usize, JournalError> {
        let bucket = self.store.get_or_create(date).await?;
        let created = bucket.reload().await?;
        tracing::info!(%date, created, "day reloaded");
        Ok(created)
    }

    /// Resolved content object for an event's primary subject.
    ///
    /// Events held by a bucket reuse the record's memoized content. A
    /// pending record is completed through its bucket's batch fetch. Other
    /// events are fetched from the log directly.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::EventNotFound`] if the log does not know the
    /// event, [`JournalError::NoSubject`] if it has no subject, and
    /// [`JournalError::Log`] if the log cannot answer.
    pub async fn record_content(&self, id: EventId) -> Result<Arc<ContentObject>, JournalError> {
        if let Some(bucket) = self.store.bucket_of(id).await {
            if bucket.get(id).await.is_some_and(|r| r.is_pending()) {
                bucket.fetch_pending().await?;
            }
            if let Some(record) = bucket.get(id).await.filter(|r| !r.is_pending()) {
                return record
                    .content(&self.resolver)
                    .await
                    .ok_or(JournalError::NoSubject(id));
            }
        }

        let event = self
            .store
            .log()
            .get_events(&[id])
            .await?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or(JournalError::EventNotFound(id))?;
        self.resolver
            .resolve(&event)
            .await
            .ok_or(JournalError::NoSubject(id))
    }

    /// Appends events to the backing log. Buckets covering their days pick
    /// them up through their live subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidRequest`] for an empty batch and
    /// [`JournalError::Log`] if the log refuses it.
    pub async fn log_events(&self, events: Vec<NewEvent>) -> Result<Vec<EventId>, JournalError> {
        if events.is_empty() {
            return Err(JournalError::InvalidRequest("no events given".to_string()));
        }
        let ids = self.store.log().insert_events(events).await?;
        tracing::info!(count = ids.len(), first = ?ids.first(), "events logged");
        Ok(ids)
    }

    /// Deletes events from the backing log.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Log`] if the log refuses or cannot be
    /// reached.
    pub async fn delete_events(&self, ids: &[EventId]) -> Result<Vec<EventId>, JournalError> {
        self.store.delete_events(ids).await
    }

    /// Drops buckets more than `radius` days from `center`.
    pub async fn evict_outside(&self, center: NaiveDate, radius: u32) -> Vec<NaiveDate> {
        self.store.evict_outside(center, radius).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use chrono::FixedOffset;

    use super::*;
    use crate::content::ContentKind;
    use crate::domain::event::interpretation;
    use crate::domain::{JournalEvent, Subject, UpdateCause};
    use crate::log::{EventLog, MemoryEventLog};

    /// 2024-01-15T00:00:00Z
    const JAN_15: i64 = 1_705_276_800;

    fn jan(d: u32) -> NaiveDate {
        let Some(date) = NaiveDate::from_ymd_opt(2024, 1, d) else {
            panic!("valid date");
        };
        date
    }

    fn visit(ts: i64, uri: &str) -> NewEvent {
        NewEvent {
            timestamp: ts,
            interpretation: interpretation::ACCESS_EVENT.to_string(),
            manifestation: String::new(),
            actor: "application://firefox.desktop".to_string(),
            subjects: vec![Subject::new(uri)],
        }
    }

    fn service_over(log: MemoryEventLog) -> JournalService {
        let Some(utc) = FixedOffset::east_opt(0) else {
            panic!("valid offset");
        };
        let log: Arc<dyn EventLog> = Arc::new(log);
        let store = Arc::new(EventStore::new(log, utc, EventBus::new(64)));
        JournalService::new(store, Arc::new(ContentResolver::new()))
    }

    async fn wait_for(service: &JournalService, date: NaiveDate, wanted: UpdateCause) {
        let mut rx = service.event_bus().subscribe();
        let _ = service.day_summary(date).await;
        loop {
            let Ok(Ok(event)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await
            else {
                panic!("no {wanted:?} for {date}");
            };
            if matches!(event, JournalEvent::DayUpdated { date: d, cause, .. } if d == date && cause == wanted)
            {
                return;
            }
        }
    }

    #[tokio::test]
    async fn list_days_rejects_inverted_and_huge_ranges() {
        let service = service_over(MemoryEventLog::new());
        assert!(matches!(
            service.list_days(jan(10), jan(9)).await,
            Err(JournalError::InvalidRequest(_))
        ));
        let Some(far) = NaiveDate::from_ymd_opt(2026, 1, 1) else {
            panic!("valid date");
        };
        assert!(service.list_days(jan(1), far).await.is_err());
    }

    #[tokio::test]
    async fn list_days_creates_every_day_in_range() {
        let service = service_over(MemoryEventLog::new());
        let Ok(days) = service.list_days(jan(1), jan(3)).await else {
            panic!("listing failed");
        };
        let dates: Vec<NaiveDate> = days.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![jan(1), jan(2), jan(3)]);
        assert_eq!(service.store().len().await, 3);
    }

    #[tokio::test]
    async fn logged_events_show_up_in_their_day() {
        let service = service_over(MemoryEventLog::new());
        wait_for(&service, jan(15), UpdateCause::InitialIds).await;

        let mut rx = service.event_bus().subscribe();
        let Ok(ids) = service
            .log_events(vec![visit(JAN_15 + 60, "https://a.org"), visit(JAN_15 + 120, "https://a.org")])
            .await
        else {
            panic!("logging failed");
        };
        assert_eq!(ids.len(), 2);
        let Ok(Ok(_)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await else {
            panic!("no update");
        };

        let Ok(grouped) = service
            .filter_day(jan(15), &[], Grouping::MostRecentSubjects)
            .await
        else {
            panic!("filter failed");
        };
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped.first().map(EventRecord::id), ids.last().copied());
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let service = service_over(MemoryEventLog::new());
        assert!(matches!(
            service.log_events(Vec::new()).await,
            Err(JournalError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn content_for_bucketed_and_unbucketed_events() {
        let service = service_over(MemoryEventLog::seeded(vec![
            visit(JAN_15 + 10, "https://rust-lang.org"),
            visit(JAN_15 - 86_400, "application://gimp.desktop"),
        ]));
        wait_for(&service, jan(15), UpdateCause::PayloadsFetched).await;

        let Ok(web) = service.record_content(EventId::new(1)).await else {
            panic!("content failed");
        };
        assert_eq!(web.kind, ContentKind::Web);

        let Ok(app) = service.record_content(EventId::new(2)).await else {
            panic!("content failed");
        };
        assert_eq!(app.kind, ContentKind::Application);

        assert!(matches!(
            service.record_content(EventId::new(9)).await,
            Err(JournalError::EventNotFound(_))
        ));
    }

    #[tokio::test]
    async fn content_of_pending_record_completes_it_through_its_day() {
        let Some(utc) = FixedOffset::east_opt(0) else {
            panic!("valid offset");
        };
        let log = Arc::new(MemoryEventLog::seeded(vec![visit(JAN_15 + 10, "https://rust-lang.org")]));
        let store = Arc::new(EventStore::new(
            Arc::clone(&log) as Arc<dyn EventLog>,
            utc,
            EventBus::new(64),
        ));
        let service = JournalService::new(Arc::clone(&store), Arc::new(ContentResolver::new()));

        log.set_available(false);
        let Ok(bucket) = store.get_or_create(jan(15)).await else {
            panic!("bucket creation failed");
        };
        while log.find_ids_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        bucket.set_ids(&[EventId::new(1)]).await;
        while log.get_events_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(bucket.pending_count().await, 1);

        log.set_available(true);
        let mut rx = service.event_bus().subscribe();
        let Ok(content) = service.record_content(EventId::new(1)).await else {
            panic!("content failed");
        };
        assert_eq!(content.kind, ContentKind::Web);
        assert_eq!(bucket.pending_count().await, 0);

        let mut causes = Vec::new();
        while let Ok(JournalEvent::DayUpdated { cause, .. }) = rx.try_recv() {
            causes.push(cause);
        }
        assert!(causes.contains(&UpdateCause::PayloadsFetched));
    }

    #[tokio::test]
    async fn subjectless_event_has_no_content() {
        let mut event = visit(JAN_15, "");
        event.subjects.clear();
        let service = service_over(MemoryEventLog::seeded(vec![event]));
        assert!(matches!(
            service.record_content(EventId::new(1)).await,
            Err(JournalError::NoSubject(_))
        ));
    }

    #[tokio::test]
    async fn reload_surfaces_log_outage() {
        let log = MemoryEventLog::new();
        log.set_available(false);
        let service = service_over(log);
        assert!(matches!(
            service.reload_day(jan(15)).await,
            Err(JournalError::Log(_))
        ));
    }
}
