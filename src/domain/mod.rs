//! Domain layer: event model, day buckets, and the event store.
//!
//! [`EventStore`] maps calendar dates to [`DayBucket`]s. Each bucket holds
//! the [`EventRecord`]s of one day, keeps itself current through a live
//! log subscription, and answers [`DayBucket::filter`] and
//! [`DayBucket::time_map`] queries. Changes are broadcast on an
//! [`EventBus`].

pub mod day_bucket;
pub mod event;
pub mod event_bus;
pub mod event_id;
pub mod event_store;
pub mod record;
pub mod template;
pub mod time_range;

pub use day_bucket::{DayBucket, DaySummary, TimeMapEntry, TimeSpan};
pub use event::{Event, NewEvent, Subject, Timestamp};
pub use event_bus::{EventBus, JournalEvent, UpdateCause};
pub use event_id::EventId;
pub use event_store::EventStore;
pub use record::EventRecord;
pub use template::{EventTemplate, Grouping};
pub use time_range::TimeRange;
