use std::fmt;

use conversation_model::Message;
use serde::{Deserialize, Serialize};

/// Reason carried by a stream's `finish` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Complete,
    Aborted,
    Error,
}

impl FinishReason {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "complete" => Self::Complete,
            "aborted" => Self::Aborted,
            "error" => Self::Error,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Aborted => "aborted",
            Self::Error => "error",
        }
    }
}

/// Typed protocol event decoded from one stream frame.
///
/// Exactly one variant is active per decoded event. Unknown discriminants are
/// a [`DecodeError`], never silently ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    #[serde(rename = "message")]
    MessageFragment { message: Message },
    #[serde(rename = "error")]
    StreamError { text: String },
    Finish { reason: FinishReason },
    ModelChange { model: String, mode: String },
    Notification {
        request_id: String,
        text: String,
    },
    Ping,
}

/// Failure to decode one frame into a [`ProtocolEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed stream event: {}", self.message)
    }
}

impl std::error::Error for DecodeError {}

/// Decodes one joined frame payload into a typed event.
pub fn decode_event(payload: &str) -> Result<ProtocolEvent, DecodeError> {
    serde_json::from_str(payload).map_err(|error| DecodeError::new(error.to_string()))
}
