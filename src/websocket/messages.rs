//! WebSocket Message Types
//!
//! Frames sent from the server to watching clients.

use serde::Serialize;

use crate::notifier::ChangeEvent;

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A user was inserted, updated or deleted
    Change(ChangeEvent),
    /// The watch could not be started or was aborted
    Error {
        /// Error description
        message: String,
    },
}

impl From<&ChangeEvent> for ServerMessage {
    fn from(event: &ChangeEvent) -> Self {
        ServerMessage::Change(event.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_serialize_change() {
        let msg = ServerMessage::from(&ChangeEvent::insert("abc-123"));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"change\""));
        assert!(json.contains("\"operation_type\":\"insert\""));
        assert!(json.contains("\"id\":\"abc-123\""));
    }

    #[test]
    fn test_server_message_serialize_error() {
        let msg = ServerMessage::Error {
            message: "Notifier has been shut down".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("\"message\":\"Notifier has been shut down\""));
    }
}
