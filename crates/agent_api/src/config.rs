use std::collections::BTreeMap;
use std::time::Duration;

use crate::url::DEFAULT_AGENT_BASE_URL;

/// Malformed events tolerated per stream attempt before the attempt aborts.
pub const DEFAULT_DECODE_ERROR_THRESHOLD: u32 = 3;

/// Per-event read timeout guarding a connection that stops emitting entirely.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport configuration for agent API requests.
///
/// Auth material and the base URL come from the caller; this crate performs
/// no credential storage or token refresh of its own.
#[derive(Debug, Clone)]
pub struct AgentApiConfig {
    /// Bearer token passed to `Authorization`.
    pub access_token: String,
    /// Base URL for agent endpoints.
    pub base_url: String,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Timeout applied to synchronous (non-stream) requests.
    pub fetch_timeout: Option<Duration>,
    /// Per-event read timeout on an open stream. Any received chunk,
    /// including a ping, resets it; expiry is a retryable failure.
    pub read_timeout: Duration,
    /// Malformed events tolerated per attempt before the stream is treated
    /// as mangled.
    pub decode_error_threshold: u32,
}

impl Default for AgentApiConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            base_url: DEFAULT_AGENT_BASE_URL.to_string(),
            user_agent: None,
            extra_headers: BTreeMap::new(),
            fetch_timeout: Some(Duration::from_secs(30)),
            read_timeout: DEFAULT_READ_TIMEOUT,
            decode_error_threshold: DEFAULT_DECODE_ERROR_THRESHOLD,
        }
    }
}

impl AgentApiConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_decode_error_threshold(mut self, threshold: u32) -> Self {
        self.decode_error_threshold = threshold;
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}
