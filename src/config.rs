use std::time::Duration;

use agent_api::retry::DEFAULT_BACKOFF_CAP;

use crate::catchup::CatchupConfig;

/// Engine-level configuration.
///
/// Transport knobs (read timeout, decode threshold, auth) live on
/// `agent_api::AgentApiConfig`; this covers the reconnection and resume
/// behavior layered on top.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on the exponential reconnect backoff.
    pub backoff_cap: Duration,
    /// Catch-up polling schedule used at session resume.
    pub catchup: CatchupConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backoff_cap: DEFAULT_BACKOFF_CAP,
            catchup: CatchupConfig::default(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_backoff_cap(mut self, cap: Duration) -> Self {
        self.backoff_cap = cap;
        self
    }

    #[must_use]
    pub fn with_catchup(mut self, catchup: CatchupConfig) -> Self {
        self.catchup = catchup;
        self
    }
}
