//! # activity-journal
//!
//! Date-partitioned activity journal with live per-day event caches over
//! an external event log, exposed through REST and WebSocket endpoints.
//!
//! Events (a user opened a file, visited a page, chatted with someone) live
//! in an external event log. The journal keeps one in-memory bucket per
//! calendar day that populates itself from the log, follows the log's live
//! insert/delete notifications, and answers filter and timeline queries.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── JournalService (service/)
//!     ├── ContentResolver (content/)
//!     │
//!     ├── EventStore → DayBucket → EventRecord (domain/)
//!     ├── EventBus (domain/)
//!     │
//!     └── EventLog (log/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod content;
pub mod domain;
pub mod error;
pub mod log;
pub mod service;
pub mod ws;
