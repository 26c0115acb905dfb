use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::value::ToolValue;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Optional presentation hint carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Terminal status of a tool response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
    Timeout,
}

impl ToolStatus {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "success" => Self::Success,
            "error" => Self::Error,
            "timeout" => Self::Timeout,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

/// One block of message content.
///
/// Text arrives token-by-token and accumulates into a single block; tool
/// blocks arrive whole and are append-only, keyed by their own call id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolRequest {
        id: String,
        name: String,
        arguments: ToolValue,
    },
    ToolResponse {
        id: String,
        status: ToolStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<ToolValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ToolConfirmationRequest {
        id: String,
        name: String,
        arguments: ToolValue,
    },
}

impl ContentBlock {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Identity of a tool block within its message: kind tag plus call id.
    ///
    /// A request and a response for the same call share the call id, so the
    /// kind tag participates in the key. Text blocks have no block identity.
    #[must_use]
    pub(crate) fn tool_block_key(&self) -> Option<(&'static str, &str)> {
        match self {
            Self::Text { .. } => None,
            Self::ToolRequest { id, .. } => Some(("tool_request", id)),
            Self::ToolResponse { id, .. } => Some(("tool_response", id)),
            Self::ToolConfirmationRequest { id, .. } => Some(("tool_confirmation_request", id)),
        }
    }
}

/// One message in a conversation transcript.
///
/// Identity is the server-assigned `id`, unique within a session. Locally
/// composed user messages carry a client-generated id that the server adopts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

impl Message {
    #[must_use]
    pub fn new(id: impl Into<String>, role: Role, created_at: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            role,
            content: Vec::new(),
            created_at,
            visibility: None,
        }
    }

    #[must_use]
    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.content.push(block);
        self
    }

    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Returns the accumulated text content, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }
}
