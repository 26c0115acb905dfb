//! Shared conversation data model.
//!
//! This crate defines the message, content-block and transcript types used by
//! both the transport layer and the session engine. It intentionally contains
//! no I/O, no async machinery and no protocol framing; those live in
//! `agent_api` and the engine crate.

mod message;
mod transcript;
mod value;

pub use message::{ContentBlock, Message, Role, ToolStatus, Visibility};
pub use transcript::{MergeOutcome, Transcript, TranscriptError};
pub use value::ToolValue;
