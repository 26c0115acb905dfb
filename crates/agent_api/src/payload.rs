use conversation_model::Message;
use serde::{Deserialize, Serialize};

/// Request body for opening a stream: the full message list to send.
///
/// One instance backs one stream attempt; a retry builds a fresh request
/// from whatever transcript reconciliation settled on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub messages: Vec<Message>,
}

impl StreamRequest {
    #[must_use]
    pub fn new(session_id: Option<String>, messages: Vec<Message>) -> Self {
        Self {
            session_id,
            messages,
        }
    }
}

/// Response body of the synchronous transcript-fetch endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub messages: Vec<Message>,
}
