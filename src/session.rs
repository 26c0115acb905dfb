use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use agent_api::{CancellationSignal, FinishReason};
use conversation_model::{ContentBlock, Message, Role};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::accumulator::MessageAccumulator;
use crate::catchup::{run_catchup, should_catch_up, CatchupOutcome};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::observer::{ConversationObserver, EngineStatus, NullObserver};
use crate::reconnect::ReconnectController;
use crate::tools::{ToolCallState, ToolCallTracker};
use crate::transport::AgentTransport;

/// Session state mutated only under the lock, one merge at a time.
pub(crate) struct SharedState {
    pub accumulator: MessageAccumulator,
    pub tracker: ToolCallTracker,
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Handle to one live, resumable conversation.
///
/// The handle is cheap to clone and safe to share with a presentation layer;
/// all session state is scoped to it — nothing process-wide. One logical
/// owner drives it at a time: a single active stream per session.
///
/// Typical resume flow: [`start`](ConversationSession::start) with the
/// messages the caller holds, spawn [`catch_up`](ConversationSession::catch_up)
/// to surface work completed while disconnected, then
/// [`send_message`](ConversationSession::send_message) for each user turn,
/// which pre-empts any catch-up still in flight.
#[derive(Clone)]
pub struct ConversationSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    session_id: String,
    config: EngineConfig,
    transport: Arc<dyn AgentTransport>,
    observer: Arc<dyn ConversationObserver>,
    state: Mutex<SharedState>,
    active_stream: Mutex<Option<CancellationSignal>>,
    catchup_signal: CancellationSignal,
}

impl ConversationSession {
    /// Creates a session over an initial message list.
    ///
    /// With no hint a fresh client-generated session id is used and the
    /// server adopts it on first contact. Initial messages seed the
    /// transcript and tool state silently; the observer only hears about
    /// changes from this point on.
    pub fn start(
        config: EngineConfig,
        transport: Arc<dyn AgentTransport>,
        observer: Arc<dyn ConversationObserver>,
        initial_messages: Vec<Message>,
        session_id_hint: Option<String>,
    ) -> Result<Self, EngineError> {
        let session_id = session_id_hint
            .map(|hint| hint.trim().to_string())
            .filter(|hint| !hint.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let accumulator = MessageAccumulator::seeded(initial_messages)?;
        let mut tracker = ToolCallTracker::new();
        for message in accumulator.transcript().messages() {
            tracker.observe_message(message, &NullObserver);
        }

        debug!(session_id = %session_id, messages = accumulator.transcript().len(), "session started");
        observer.on_status(&EngineStatus::Idle);

        Ok(Self {
            inner: Arc::new(SessionInner {
                session_id,
                config,
                transport,
                observer,
                state: Mutex::new(SharedState {
                    accumulator,
                    tracker,
                }),
                active_stream: Mutex::new(None),
                catchup_signal: Arc::new(AtomicBool::new(false)),
            }),
        })
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Snapshot of the current transcript.
    #[must_use]
    pub fn transcript(&self) -> Vec<Message> {
        lock_unpoisoned(&self.inner.state)
            .accumulator
            .transcript()
            .to_vec()
    }

    /// Snapshot of tool-call state in call-creation order.
    #[must_use]
    pub fn tool_calls(&self) -> Vec<(String, ToolCallState)> {
        lock_unpoisoned(&self.inner.state).tracker.snapshot()
    }

    /// Runs catch-up polling for a resumed session.
    ///
    /// Returns immediately with [`CatchupOutcome::Skipped`] unless the
    /// trailing message is from the user and recent; callers typically spawn
    /// this right after [`start`](Self::start) so it never blocks them. It
    /// is pre-empted by [`send_message`](Self::send_message) and
    /// [`cancel`](Self::cancel).
    pub async fn catch_up(&self) -> CatchupOutcome {
        let applicable = {
            let guard = lock_unpoisoned(&self.inner.state);
            should_catch_up(
                guard.accumulator.transcript().last(),
                OffsetDateTime::now_utc(),
                self.inner.config.catchup.freshness_window,
            )
        };
        if !applicable {
            return CatchupOutcome::Skipped;
        }

        run_catchup(
            self.inner.transport.as_ref(),
            &self.inner.session_id,
            &self.inner.config.catchup,
            &self.inner.state,
            self.inner.observer.as_ref(),
            &self.inner.catchup_signal,
        )
        .await
    }

    /// Appends one user message and drives streaming to a terminal state.
    ///
    /// Retryable failures are absorbed by the reconnection controller; the
    /// call returns only on completion, cancellation or a terminal error.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<FinishReason, EngineError> {
        // Streaming supersedes resume-time polling.
        self.inner.catchup_signal.store(true, Ordering::Release);

        let message = Message::new(
            Uuid::new_v4().to_string(),
            Role::User,
            OffsetDateTime::now_utc(),
        )
        .with_block(ContentBlock::text(text));

        let messages = {
            let mut guard = lock_unpoisoned(&self.inner.state);
            guard
                .accumulator
                .merge(message, self.inner.observer.as_ref());
            guard.accumulator.transcript().to_vec()
        };

        let cancellation: CancellationSignal = Arc::new(AtomicBool::new(false));
        *lock_unpoisoned(&self.inner.active_stream) = Some(Arc::clone(&cancellation));

        let controller = ReconnectController {
            transport: self.inner.transport.as_ref(),
            session_id: &self.inner.session_id,
            backoff_cap: self.inner.config.backoff_cap,
            state: &self.inner.state,
            observer: self.inner.observer.as_ref(),
            cancellation: &cancellation,
        };
        let result = controller.drive(messages).await;

        *lock_unpoisoned(&self.inner.active_stream) = None;
        result
    }

    /// Tears down the active stream (if any) and stops catch-up polling.
    ///
    /// Cancellation is terminal for the in-flight send: no retry follows,
    /// regardless of pending backoff timers. A later `send_message` starts a
    /// fresh flow.
    pub fn cancel(&self) {
        self.inner.catchup_signal.store(true, Ordering::Release);
        if let Some(signal) = lock_unpoisoned(&self.inner.active_stream).as_ref() {
            signal.store(true, Ordering::Release);
        }
    }
}
