use agent_api::AgentApiError;
use conversation_model::TranscriptError;
use thiserror::Error;

/// Terminal errors surfaced to the engine's caller.
///
/// Retryable transport failures never reach this type; the reconnection
/// controller absorbs them. Only non-retryable failures and explicit
/// cancellation end a send.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport failure: {0}")]
    Transport(#[from] AgentApiError),

    #[error("invalid transcript: {0}")]
    Transcript(#[from] TranscriptError),

    #[error("operation cancelled")]
    Cancelled,
}
