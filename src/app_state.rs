//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::JournalService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Journal service for all reads and mutations.
    pub journal_service: Arc<JournalService>,
    /// Store-level event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl AppState {
    /// Builds the state around a service, sharing its store's bus.
    #[must_use]
    pub fn new(journal_service: Arc<JournalService>) -> Self {
        let event_bus = journal_service.event_bus().clone();
        Self {
            journal_service,
            event_bus,
        }
    }
}
