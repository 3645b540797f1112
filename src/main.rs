//! activity-journal server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints over an
//! in-process event log.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use activity_journal::api;
use activity_journal::app_state::AppState;
use activity_journal::config::{JournalConfig, LogFormat};
use activity_journal::content::ContentResolver;
use activity_journal::domain::{EventBus, EventStore};
use activity_journal::log::{EventLog, MemoryEventLog};
use activity_journal::service::JournalService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = JournalConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
    tracing::info!(
        addr = %config.listen_addr,
        utc_offset = %config.utc_offset,
        prewarm_days = config.prewarm_days,
        "starting activity-journal"
    );

    // Build domain layer
    let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
    let event_bus = EventBus::new(config.event_bus_capacity);
    let store = Arc::new(EventStore::new(log, config.utc_offset, event_bus));
    store
        .prewarm(store.today(), config.prewarm_days)
        .await
        .context("prewarming day buckets")?;

    // Build service layer
    let resolver = Arc::new(ContentResolver::new());
    let journal_service = Arc::new(JournalService::new(store, resolver));

    // Build router
    let app = api::build_app(AppState::new(journal_service));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
