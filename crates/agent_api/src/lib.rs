//! Transport-only client primitives for the agent event-stream protocol.
//!
//! This crate owns request building, event-stream framing and typed-event
//! decoding, plus the synchronous transcript-fetch call. It intentionally
//! contains no session state: retry orchestration, reconciliation and
//! transcript accumulation live in the engine crate on top.
//!
//! A stream attempt is single-shot. The client opens one connection, decodes
//! events until the server closes it, and reports how it ended; deciding
//! whether to reconnect is the caller's job.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod url;

pub use client::{AgentClient, CancellationSignal};
pub use config::AgentApiConfig;
pub use error::AgentApiError;
pub use events::{DecodeError, FinishReason, ProtocolEvent};
pub use payload::{StreamRequest, TranscriptResponse};
pub use sse::EventStreamParser;
pub use url::normalize_base_url;
