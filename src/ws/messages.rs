//! WebSocket message types: envelope and commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a server message stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error reply carrying a numeric code and message.
    #[must_use]
    pub fn error(id: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({
                "code": code,
                "message": message.into(),
            }),
        )
    }

    /// Serializes the message to JSON text.
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send over WebSocket, carried in the
/// payload of a [`WsMessageType::Command`] message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Receive update notifications for specific days.
    Subscribe {
        /// `YYYY-MM-DD` dates, `today`, `yesterday`, or `"*"` for all days.
        dates: Vec<String>,
    },
    /// Stop receiving notifications for specific days.
    Unsubscribe {
        /// Dates to drop.
        dates: Vec<String>,
    },
    /// Fetch the current summary and events of a day.
    GetDay {
        /// Day to fetch.
        date: String,
    },
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_from_payload() {
        let Ok(cmd) = serde_json::from_value::<WsCommand>(serde_json::json!({
            "command": "subscribe",
            "dates": ["2024-01-15", "*"]
        })) else {
            panic!("valid command");
        };
        let WsCommand::Subscribe { dates } = cmd else {
            panic!("expected subscribe");
        };
        assert_eq!(dates.len(), 2);

        let get_day = serde_json::from_value::<WsCommand>(serde_json::json!({
            "command": "get_day",
            "date": "today"
        }));
        assert!(matches!(get_day, Ok(WsCommand::GetDay { .. })));
    }

    #[test]
    fn envelope_uses_type_field() {
        let msg = WsMessage::error("7", 400, "bad");
        let Some(json) = msg.to_json() else {
            panic!("serializable");
        };
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""id":"7""#));
    }
}
