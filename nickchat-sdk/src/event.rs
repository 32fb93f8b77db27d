//! Events emitted by the connection manager for the UI layer to consume.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ChatError;
use crate::state::ConnectionState;

/// Events that the SDK emits to the consumer (terminal UI, GUI, bot, ...).
///
/// Serialized with `tag = "type", content = "data"` so a non-Rust front end
/// can switch on `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// Human-readable status line ("Connecting to ...", "Disconnected.").
    StatusChanged { text: String },

    /// A chat line to render: from the server, echoed from us, or a system notice.
    MessageReceived(ChatLine),

    /// The lifecycle state moved.
    ///
    /// `error` is set when a connection attempt or session ended abnormally;
    /// the UI should re-present its connection prompt. `greeting` carries the
    /// server's optional reply to our nickname on `Connected`.
    ConnectionStateChanged {
        state: ConnectionState,
        error: Option<ChatError>,
        greeting: Option<String>,
    },
}

/// Where a chat line came from. Drives left/right placement in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Local,
    Remote,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatLine {
    pub origin: Origin,
    /// Full text, sender prefix included (`"bob: hi"`).
    pub text: String,
    pub at: DateTime<Utc>,
}

impl ChatLine {
    pub fn new(origin: Origin, text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            origin,
            text: text.into(),
            at,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Origin::System, text, Utc::now())
    }
}

impl Event {
    pub(crate) fn status(text: impl Into<String>) -> Self {
        Event::StatusChanged { text: text.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_event_json_shape() {
        let at = DateTime::parse_from_rfc3339("2025-01-01T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let event = Event::MessageReceived(ChatLine::new(Origin::Remote, "bob: hi", at));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message_received");
        assert_eq!(json["data"]["origin"], "remote");
        assert_eq!(json["data"]["text"], "bob: hi");
    }

    #[test]
    fn state_event_json_shape() {
        let event = Event::ConnectionStateChanged {
            state: ConnectionState::Disconnected,
            error: Some(ChatError::HandshakeTimeout),
            greeting: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "connection_state_changed");
        assert_eq!(json["data"]["state"], "disconnected");
        assert_eq!(json["data"]["error"]["kind"], "handshake_timeout");
        assert!(json["data"]["greeting"].is_null());
    }
}
