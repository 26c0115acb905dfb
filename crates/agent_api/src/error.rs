use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::events::DecodeError;
use crate::retry::{is_retryable_status, is_transient_error_text};

/// Transport-layer error taxonomy.
///
/// Retryability is a property of the variant (see [`AgentApiError::is_retryable`]);
/// the engine's reconnection controller consults it before deciding whether
/// to reconcile-and-reconnect or surface the failure.
#[derive(Debug)]
pub enum AgentApiError {
    MissingAccessToken,
    InvalidHeader(String),
    /// Transport-level request failure: DNS, connect, reset, timeout.
    Request(reqwest::Error),
    /// Stream-level connectivity failure: read timeout, or the connection
    /// closed before a finish event arrived.
    Connectivity(String),
    /// HTTP 5xx-equivalent (including throttling and transient upstream
    /// failures recognized by error text).
    RemoteServer(StatusCode, String),
    /// HTTP 4xx-equivalent; retrying an invalid request is never productive.
    RemoteClient(StatusCode, String),
    /// The server reported a mid-stream failure via an `error` event.
    StreamFailed { text: String },
    /// The per-attempt malformed-event threshold was reached.
    DecodeThreshold { count: u32, last: DecodeError },
    Cancelled,
}

impl AgentApiError {
    /// Classifies a non-success HTTP response.
    #[must_use]
    pub fn from_status(status: StatusCode, message: String) -> Self {
        if is_retryable_status(status.as_u16()) || is_transient_error_text(&message) {
            Self::RemoteServer(status, message)
        } else {
            Self::RemoteClient(status, message)
        }
    }

    /// Whether the reconnection controller may transparently retry after
    /// this failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_)
            | Self::Connectivity(_)
            | Self::RemoteServer(_, _)
            | Self::StreamFailed { .. } => true,
            Self::MissingAccessToken
            | Self::InvalidHeader(_)
            | Self::RemoteClient(_, _)
            | Self::DecodeThreshold { .. }
            | Self::Cancelled => false,
        }
    }
}

impl fmt::Display for AgentApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAccessToken => write!(f, "access token is required"),
            Self::InvalidHeader(value) => write!(f, "invalid header: {value}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Connectivity(message) => write!(f, "connectivity failure: {message}"),
            Self::RemoteServer(status, message) => {
                write!(f, "remote server error (HTTP {status}): {message}")
            }
            Self::RemoteClient(status, message) => {
                write!(f, "remote client error (HTTP {status}): {message}")
            }
            Self::StreamFailed { text } => write!(f, "stream failed: {text}"),
            Self::DecodeThreshold { count, last } => {
                write!(f, "stream produced {count} malformed events (last: {last})")
            }
            Self::Cancelled => write!(f, "request was cancelled"),
        }
    }
}

impl std::error::Error for AgentApiError {}

impl From<reqwest::Error> for AgentApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(rename = "error")]
    pub value: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayloadFields {
    pub message: Option<String>,
}

/// Extracts a human-readable message from an error response body, falling
/// back to the raw body and then the status line.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(ErrorPayload {
        value: Some(ErrorPayloadFields {
            message: Some(message),
        }),
    }) = serde_json::from_str::<ErrorPayload>(body)
    {
        if !message.trim().is_empty() {
            return message;
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
