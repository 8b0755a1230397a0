//! Protocol message definitions
//!
//! All message types exchanged between the background relay and the UI
//! consumer. Messages are serialized as JSON with a type discriminator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ProtocolVersion;
use crate::persona::PersonaLevel;

// ─────────────────────────────────────────────────────────────────
// Message Envelope
// ─────────────────────────────────────────────────────────────────

/// Wrapper for all protocol messages with metadata
///
/// Every message carries the ordinal of the persona it originated under and,
/// for relay-originated stream traffic, the identifier of its session. The
/// consumer uses the session identifier to discard messages from superseded
/// sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Unique message ID
    pub id: Uuid,

    /// Message timestamp
    pub timestamp: DateTime<Utc>,

    /// Protocol version
    pub version: ProtocolVersion,

    /// Originating session (absent for control traffic such as SET_LEVEL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<u64>,

    /// Ordinal of the persona level this message was produced under
    pub level: u32,

    /// The actual message payload
    #[serde(flatten)]
    pub payload: Message,
}

impl MessageEnvelope {
    /// Create an envelope for control traffic (no session)
    pub fn new(level: u32, payload: Message) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            version: ProtocolVersion::CURRENT,
            session: None,
            level,
            payload,
        }
    }

    /// Create an envelope stamped with a streaming session identifier
    pub fn for_session(session: u64, level: u32, payload: Message) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            version: ProtocolVersion::CURRENT,
            session: Some(session),
            level,
            payload,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Message Types (Discriminated Union)
// ─────────────────────────────────────────────────────────────────

/// All protocol messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    // ─── UI → Relay ─────────────────────────────────────────────
    /// Persona selection change; the relay persists it as the current level
    SetLevel { level: PersonaLevel },

    // ─── Relay → UI ─────────────────────────────────────────────
    /// One text increment of a streaming session; `is_first` marks the
    /// session-opening message that resets the display buffer
    StreamResponse { text: String, is_first: bool },

    /// Normal exhaustion of the chunk sequence
    StreamComplete,

    /// A failure caught at the relay boundary; `message` replaces the
    /// display buffer verbatim
    Error { code: String, message: String },

    /// Capability model download in progress
    AiInitiate { loaded: u64, total: u64 },

    /// Capability model finished downloading and is ready to stream
    AiReady,
}

impl Message {
    /// Get the message type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::SetLevel { .. } => "SET_LEVEL",
            Message::StreamResponse { .. } => "STREAM_RESPONSE",
            Message::StreamComplete => "STREAM_COMPLETE",
            Message::Error { .. } => "ERROR",
            Message::AiInitiate { .. } => "AI_INITIATE",
            Message::AiReady => "AI_READY",
        }
    }

    /// Check if this message flows relay → UI
    pub fn is_ui_bound(&self) -> bool {
        !matches!(self, Message::SetLevel { .. })
    }

    /// Check if this message flows UI → relay
    pub fn is_relay_bound(&self) -> bool {
        !self.is_ui_bound()
    }

    /// Create the session-opening marker message
    pub fn first_marker() -> Self {
        Message::StreamResponse {
            text: String::new(),
            is_first: true,
        }
    }

    /// Create a chunk message
    pub fn chunk(text: impl Into<String>) -> Self {
        Message::StreamResponse {
            text: text.into(),
            is_first: false,
        }
    }

    /// Create an error message from a relay error
    pub fn from_error(err: &crate::error::Error) -> Self {
        Message::Error {
            code: err.code().as_str(),
            message: err.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Message Helpers
// ─────────────────────────────────────────────────────────────────

impl MessageEnvelope {
    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona;

    #[test]
    fn test_set_level_serialize() {
        let level = persona::builtin_levels().remove(1);
        let name = level.name.clone();
        let envelope = MessageEnvelope::new(level.level, Message::SetLevel { level });
        let json = envelope.to_json().unwrap();

        assert!(json.contains("SET_LEVEL"));
        assert!(json.contains(&name));
        // Control traffic carries no session field at all
        assert!(!json.contains("\"session\""));
    }

    #[test]
    fn test_stream_response_round_trip() {
        let envelope = MessageEnvelope::for_session(3, 2, Message::chunk("Hello, "));
        let json = envelope.to_json().unwrap();
        let parsed = MessageEnvelope::from_json(&json).unwrap();

        assert_eq!(parsed.session, Some(3));
        assert_eq!(parsed.level, 2);
        match parsed.payload {
            Message::StreamResponse { text, is_first } => {
                assert_eq!(text, "Hello, ");
                assert!(!is_first);
            }
            other => panic!("Expected StreamResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_first_marker() {
        let marker = Message::first_marker();
        match &marker {
            Message::StreamResponse { text, is_first } => {
                assert!(text.is_empty());
                assert!(*is_first);
            }
            other => panic!("Expected StreamResponse, got {:?}", other),
        }
        assert_eq!(marker.type_name(), "STREAM_RESPONSE");
    }

    #[test]
    fn test_discriminator_values() {
        let cases = [
            (Message::first_marker(), "STREAM_RESPONSE"),
            (Message::StreamComplete, "STREAM_COMPLETE"),
            (
                Message::Error {
                    code: "E400".to_string(),
                    message: "boom".to_string(),
                },
                "ERROR",
            ),
            (
                Message::AiInitiate {
                    loaded: 10,
                    total: 100,
                },
                "AI_INITIATE",
            ),
            (Message::AiReady, "AI_READY"),
        ];

        for (msg, expected) in cases {
            let value = serde_json::to_value(&msg).unwrap();
            assert_eq!(value["type"], expected);
            assert_eq!(msg.type_name(), expected);
        }
    }

    #[test]
    fn test_message_direction() {
        let level = persona::builtin_levels().remove(0);
        assert!(Message::SetLevel { level }.is_relay_bound());
        assert!(Message::StreamComplete.is_ui_bound());
        assert!(Message::AiReady.is_ui_bound());
        assert!(!Message::StreamComplete.is_relay_bound());
    }

    #[test]
    fn test_error_from_relay_error() {
        let err = crate::error::Error::unavailable("Summarizer");
        let msg = Message::from_error(&err);

        match msg {
            Message::Error { code, message } => {
                assert_eq!(code, "E300");
                assert_eq!(message, "Summarizer is not available on this device");
            }
            other => panic!("Expected Error, got {:?}", other),
        }
    }

    #[test]
    fn test_ai_initiate_progress() {
        let envelope =
            MessageEnvelope::for_session(1, 1, Message::AiInitiate { loaded: 512, total: 2048 });
        let json = envelope.to_json().unwrap();
        let parsed = MessageEnvelope::from_json(&json).unwrap();

        match parsed.payload {
            Message::AiInitiate { loaded, total } => {
                assert_eq!(loaded, 512);
                assert_eq!(total, 2048);
            }
            other => panic!("Expected AiInitiate, got {:?}", other),
        }
    }
}
