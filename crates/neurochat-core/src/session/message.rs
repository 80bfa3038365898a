//! Chat message types.

use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// Message typed by the user.
    User,
    /// Canned reply from the responder.
    Bot,
}

/// A single message in a session's log.
///
/// Immutable once created; logs are append-only and insertion order is
/// the log order. The timestamp is a display-formatted local time string,
/// not a sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message identifier (UUID format).
    pub id: String,
    /// The message text.
    pub text: String,
    /// Who sent the message.
    pub sender: Sender,
    /// Display-formatted local time (HH:MM).
    pub timestamp: String,
}

impl ChatMessage {
    /// Creates a message with a fresh id and the current local time.
    pub fn new(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            sender,
            timestamp: Local::now().format("%H:%M").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Sender::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Sender::Bot).unwrap(), "\"bot\"");
    }

    #[test]
    fn test_message_round_trip() {
        let msg = ChatMessage::new("what is cvst", Sender::User);
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_message_missing_field_rejected() {
        let json = r#"{"id":"1","text":"hi","sender":"user"}"#;
        assert!(serde_json::from_str::<ChatMessage>(json).is_err());
    }

    #[test]
    fn test_timestamp_is_hour_minute() {
        let msg = ChatMessage::new("hi", Sender::Bot);
        assert_eq!(msg.timestamp.len(), 5);
        assert_eq!(&msg.timestamp[2..3], ":");
    }
}
