use agent_api::FinishReason;
use conversation_model::Message;

use crate::tools::ToolCallState;

/// Engine lifecycle status surfaced to the observer.
///
/// Retryable failures never appear here as terminal states; they manifest
/// only as `Reconnecting`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    Connecting,
    Streaming,
    Reconnecting { attempt: u32 },
    Completed { reason: FinishReason },
    Failed { message: String },
    Cancelled,
}

/// Non-fatal condition surfaced alongside continued operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineWarning {
    /// The server's transcript was shorter than the locally held one; the
    /// local view is kept so the caller-visible transcript never shrinks.
    TranscriptRegression { local: usize, server: usize },
    /// The server's transcript disagrees with the local one before the local
    /// end; the local view is kept.
    TranscriptDivergence { position: usize },
}

/// Subscription point for incremental session updates.
///
/// Delivery is synchronous, strictly sequential per session and in event
/// order; implementations must not block for long, since a slow observer
/// back-pressures the stream read loop. All methods default to no-ops.
pub trait ConversationObserver: Send + Sync {
    /// A message was inserted or updated by a merge; `message` is the
    /// post-merge snapshot.
    fn on_message(&self, message: &Message) {
        let _ = message;
    }

    /// A tool call transitioned state.
    fn on_tool_update(&self, call_id: &str, state: &ToolCallState) {
        let _ = (call_id, state);
    }

    fn on_status(&self, status: &EngineStatus) {
        let _ = status;
    }

    fn on_model_change(&self, model: &str, mode: &str) {
        let _ = (model, mode);
    }

    fn on_notification(&self, request_id: &str, text: &str) {
        let _ = (request_id, text);
    }

    fn on_warning(&self, warning: &EngineWarning) {
        let _ = warning;
    }
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ConversationObserver for NullObserver {}
