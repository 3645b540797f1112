//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered notifications.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use chrono::NaiveDate;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::api::dto::{DaySummaryDto, EventDto};
use crate::domain::{Grouping, JournalEvent};
use crate::error::JournalError;
use crate::service::JournalService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards notifications for subscribed days from the
///   [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<JournalEvent>,
    service: Arc<JournalService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs, &service).await;
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(journal_event) => {
                        if subs.matches(journal_event.date()) {
                            let msg = WsMessage::new(
                                uuid::Uuid::new_v4().to_string(),
                                WsMessageType::Event,
                                serde_json::to_value(&journal_event).unwrap_or_default(),
                            );
                            let json = msg.to_json().unwrap_or_default();
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Handles a text message from the client, returning an optional JSON
/// response.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    service: &JournalService,
) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error("", 400, "malformed JSON").to_json();
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command").to_json();
    };

    let reply = match command {
        WsCommand::Subscribe { dates } => subscribe(&dates, subs, service).await,
        WsCommand::Unsubscribe { dates } => {
            parse_dates(&dates, service).map(|(days, wildcard)| {
                subs.unsubscribe(&days, wildcard);
                serde_json::json!({
                    "unsubscribed": days.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                })
            })
        }
        WsCommand::GetDay { date } => get_day(&date, service).await,
    };

    match reply {
        Ok(payload) => WsMessage::new(msg.id, WsMessageType::Response, payload).to_json(),
        Err(err) => {
            WsMessage::error(msg.id, err.status_code().as_u16(), err.to_string()).to_json()
        }
    }
}

/// Subscribes to the given days and makes sure their buckets exist, so
/// that notifications start flowing.
async fn subscribe(
    dates: &[String],
    subs: &mut SubscriptionManager,
    service: &JournalService,
) -> Result<serde_json::Value, JournalError> {
    let (days, wildcard) = parse_dates(dates, service)?;
    for date in &days {
        service.day_summary(*date).await?;
    }
    subs.subscribe(&days, wildcard);
    tracing::debug!(days = days.len(), wildcard, "ws subscription updated");
    Ok(serde_json::json!({
        "subscribed": days.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "count": subs.count(),
        "wildcard": subs.is_subscribed_all(),
    }))
}

async fn get_day(raw: &str, service: &JournalService) -> Result<serde_json::Value, JournalError> {
    let date = service.parse_date(raw)?;
    let summary = service.day_summary(date).await?;
    let records = service.filter_day(date, &[], Grouping::None).await?;
    Ok(serde_json::json!({
        "summary": DaySummaryDto::from(summary),
        "events": EventDto::from_records(&records),
    }))
}

/// Splits raw date strings into parsed days and the wildcard flag.
fn parse_dates(
    raw: &[String],
    service: &JournalService,
) -> Result<(Vec<NaiveDate>, bool), JournalError> {
    let mut days = Vec::with_capacity(raw.len());
    let mut wildcard = false;
    for value in raw {
        if value == "*" {
            wildcard = true;
        } else {
            days.push(service.parse_date(value)?);
        }
    }
    Ok((days, wildcard))
}
