//! Service layer: orchestration shared by the REST and WebSocket surfaces.
//!
//! [`JournalService`] reads through the [`crate::domain::EventStore`],
//! resolves content through the [`crate::content::ContentResolver`] and
//! forwards mutations to the backing [`crate::log::EventLog`].

pub mod journal_service;

pub use journal_service::{JournalService, MAX_DAY_SPAN};
