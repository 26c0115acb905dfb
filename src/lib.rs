//! Client-side engine for a live, resumable conversation with a remote
//! agent over an event-stream protocol.
//!
//! The agent may take arbitrarily long, may invoke tools mid-response, and
//! the network may drop at any time. The engine presents callers with a
//! single coherent, monotonically-growing transcript regardless: stream
//! interruptions reconcile against the server's authoritative transcript
//! before any retry, duplicate deliveries merge idempotently, and sessions
//! resumed after an absence catch up on work the agent completed unattended.
//!
//! # Overview
//! - [`ConversationSession`] is the boundary handle: start/resume, send,
//!   cancel, snapshot.
//! - [`ConversationObserver`] is the subscription point for incremental
//!   transcript, tool-call and status updates; delivery is synchronous and
//!   strictly ordered per session.
//! - Transport is pluggable through [`AgentTransport`]; [`HttpTransport`]
//!   is the production implementation over `agent_api`.
//!
//! The engine never persists history locally (the remote service is
//! authoritative) and never patches a broken connection byte-wise — on
//! reconnection it re-derives state from the server's transcript.

pub mod accumulator;
pub mod catchup;
pub mod config;
pub mod error;
pub mod observer;
pub mod session;
pub mod tools;
pub mod transport;

mod reconcile;
mod reconnect;

pub use accumulator::MessageAccumulator;
pub use catchup::{CatchupConfig, CatchupOutcome};
pub use config::EngineConfig;
pub use error::EngineError;
pub use observer::{ConversationObserver, EngineStatus, EngineWarning, NullObserver};
pub use session::ConversationSession;
pub use tools::{ToolCallResult, ToolCallState, ToolCallTracker};
pub use transport::{AgentTransport, HttpTransport};

pub use agent_api::{AgentApiConfig, AgentApiError, FinishReason, ProtocolEvent};
pub use conversation_model::{
    ContentBlock, Message, MergeOutcome, Role, ToolStatus, ToolValue, Transcript, Visibility,
};
