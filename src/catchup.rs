use std::sync::Mutex;
use std::time::Duration;

use agent_api::{AgentApiError, CancellationSignal};
use conversation_model::{Message, Role};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::observer::ConversationObserver;
use crate::reconnect::sleep_or_cancel;
use crate::session::{lock_unpoisoned, SharedState};
use crate::transport::AgentTransport;

/// Schedule and budget for catch-up polling at session resume.
///
/// The total budget is an explicit knob rather than a constant: callers
/// resuming sessions whose agent may run multi-minute tool executions can
/// raise it without touching the engine.
#[derive(Debug, Clone)]
pub struct CatchupConfig {
    /// How recent the trailing user message must be for polling to run.
    pub freshness_window: Duration,
    /// Interval for the first `initial_polls` polls.
    pub initial_interval: Duration,
    /// Interval after the initial polls.
    pub later_interval: Duration,
    /// Number of polls at the initial interval.
    pub initial_polls: u32,
    /// Total polling budget; expiry is a normal outcome, not an error.
    pub total_budget: Duration,
}

impl Default for CatchupConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(300),
            initial_interval: Duration::from_secs(3),
            later_interval: Duration::from_secs(5),
            initial_polls: 5,
            total_budget: Duration::from_secs(20),
        }
    }
}

impl CatchupConfig {
    #[must_use]
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    #[must_use]
    pub fn with_intervals(mut self, initial: Duration, later: Duration) -> Self {
        self.initial_interval = initial;
        self.later_interval = later;
        self
    }

    #[must_use]
    pub fn with_initial_polls(mut self, polls: u32) -> Self {
        self.initial_polls = polls;
        self
    }

    #[must_use]
    pub fn with_total_budget(mut self, budget: Duration) -> Self {
        self.total_budget = budget;
        self
    }
}

/// How one catch-up run ended. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchupOutcome {
    /// Resume conditions did not hold; no poll was issued.
    Skipped,
    /// Work completed while disconnected was found and surfaced.
    Caught { revealed: usize },
    /// The budget elapsed with no growth; the session is resumed-but-idle.
    Idle,
    /// The caller sent a new message (or cancelled) before polling finished.
    Preempted,
}

/// Whether resuming this transcript warrants polling: the trailing message
/// is from the user and recent enough that the agent may still be working.
pub(crate) fn should_catch_up(
    last: Option<&Message>,
    now: OffsetDateTime,
    freshness_window: Duration,
) -> bool {
    let Some(last) = last else {
        return false;
    };
    if last.role != Role::User {
        return false;
    }

    now - last.created_at < freshness_window
}

/// Polls the transcript-fetch endpoint until growth, budget expiry or
/// pre-emption.
///
/// Growth is adopted through the accumulator, so the observer sees each new
/// message exactly once; transient fetch failures count as empty polls.
pub(crate) async fn run_catchup(
    transport: &dyn AgentTransport,
    session_id: &str,
    config: &CatchupConfig,
    state: &Mutex<SharedState>,
    observer: &dyn ConversationObserver,
    cancellation: &CancellationSignal,
) -> CatchupOutcome {
    let baseline = lock_unpoisoned(state).accumulator.transcript().len();
    let started = tokio::time::Instant::now();
    let mut polls: u32 = 0;

    loop {
        let interval = if polls < config.initial_polls {
            config.initial_interval
        } else {
            config.later_interval
        };

        if started.elapsed() + interval > config.total_budget {
            debug!(polls, "catch-up budget elapsed with no growth");
            return CatchupOutcome::Idle;
        }

        if sleep_or_cancel(interval, cancellation).await.is_err() {
            return CatchupOutcome::Preempted;
        }
        polls += 1;

        match transport.fetch_transcript(session_id, cancellation).await {
            Err(AgentApiError::Cancelled) => return CatchupOutcome::Preempted,
            Err(error) => {
                debug!(%error, poll = polls, "catch-up poll failed; treating as empty");
            }
            Ok(server) if server.len() > baseline => {
                let mut guard = lock_unpoisoned(state);
                let SharedState {
                    accumulator,
                    tracker,
                } = &mut *guard;
                match accumulator.adopt(server, observer) {
                    Ok(revealed) => {
                        for message in &revealed {
                            tracker.observe_message(message, observer);
                        }
                        debug!(revealed = revealed.len(), poll = polls, "caught up");
                        return CatchupOutcome::Caught {
                            revealed: revealed.len(),
                        };
                    }
                    Err(error) => {
                        warn!(%error, "catch-up adoption rejected; stopping");
                        return CatchupOutcome::Idle;
                    }
                }
            }
            Ok(_) => {}
        }
    }
}
