use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;

use agent_api::retry::reconnect_delay;
use agent_api::{AgentApiError, CancellationSignal, FinishReason, ProtocolEvent, StreamRequest};
use conversation_model::Message;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::observer::{ConversationObserver, EngineStatus};
use crate::reconcile::{reconcile, ReconcileOutcome};
use crate::session::{lock_unpoisoned, SharedState};
use crate::transport::AgentTransport;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Owns the lifecycle of streaming one message list to a terminal state.
///
/// Each call to [`drive`](ReconnectController::drive) may span many stream
/// attempts; every retryable failure goes through reconciliation before a
/// fresh attempt is issued with exponential, capped backoff. There is no
/// retry ceiling — retries continue until the caller cancels.
pub(crate) struct ReconnectController<'a> {
    pub transport: &'a dyn AgentTransport,
    pub session_id: &'a str,
    pub backoff_cap: Duration,
    pub state: &'a Mutex<SharedState>,
    pub observer: &'a dyn ConversationObserver,
    pub cancellation: &'a CancellationSignal,
}

impl ReconnectController<'_> {
    pub async fn drive(&self, mut messages: Vec<Message>) -> Result<FinishReason, EngineError> {
        let mut attempt: u32 = 0;

        loop {
            if self.is_cancelled() {
                return self.cancelled();
            }

            self.observer.on_status(&EngineStatus::Connecting);
            let request = StreamRequest::new(Some(self.session_id.to_string()), messages.clone());

            match self.run_attempt(&request).await {
                Ok(reason) => {
                    self.observer
                        .on_status(&EngineStatus::Completed { reason });
                    return Ok(reason);
                }
                Err(AgentApiError::Cancelled) => return self.cancelled(),
                Err(error) if !error.is_retryable() => {
                    let message = error.to_string();
                    warn!(%error, "stream failed terminally");
                    self.observer.on_status(&EngineStatus::Failed { message });
                    return Err(EngineError::Transport(error));
                }
                Err(error) => {
                    debug!(%error, attempt, "stream attempt failed; reconciling before retry");
                    self.observer.on_status(&EngineStatus::Reconnecting {
                        attempt: attempt + 1,
                    });

                    match reconcile(
                        self.transport,
                        self.session_id,
                        self.cancellation,
                        self.state,
                        self.observer,
                    )
                    .await
                    {
                        Ok((ReconcileOutcome::Advanced { revealed }, _)) => {
                            // The server finished the work while we were
                            // disconnected; resending would discard it.
                            debug!(revealed, "reconciliation found the reply; not retrying");
                            lock_unpoisoned(self.state)
                                .tracker
                                .finish_stream(self.observer);
                            let reason = FinishReason::Complete;
                            self.observer
                                .on_status(&EngineStatus::Completed { reason });
                            return Ok(reason);
                        }
                        Ok((_, basis)) => messages = basis,
                        Err(AgentApiError::Cancelled) => return self.cancelled(),
                        Err(fetch_error) => {
                            // Transient fetch failure: back off and try the
                            // whole cycle again with the local list.
                            debug!(%fetch_error, "reconciliation fetch failed; keeping local list");
                        }
                    }

                    let delay = reconnect_delay(attempt, self.backoff_cap);
                    if sleep_or_cancel(delay, self.cancellation).await.is_err() {
                        return self.cancelled();
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn run_attempt(&self, request: &StreamRequest) -> Result<FinishReason, AgentApiError> {
        let state = self.state;
        let observer = self.observer;
        let mut streaming_announced = false;

        let mut on_event = |event: ProtocolEvent| {
            if !streaming_announced {
                streaming_announced = true;
                observer.on_status(&EngineStatus::Streaming);
            }
            handle_event(state, observer, event);
        };

        self.transport
            .run_stream(request, self.cancellation, &mut on_event)
            .await
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.load(Ordering::Acquire)
    }

    fn cancelled(&self) -> Result<FinishReason, EngineError> {
        self.observer.on_status(&EngineStatus::Cancelled);
        Err(EngineError::Cancelled)
    }
}

/// Applies one decoded event to session state.
///
/// The state lock is held only for the duration of a single merge; observer
/// delivery happens under it, which is what serializes notifications per
/// session.
fn handle_event(
    state: &Mutex<SharedState>,
    observer: &dyn ConversationObserver,
    event: ProtocolEvent,
) {
    match event {
        ProtocolEvent::MessageFragment { message } => {
            let mut guard = lock_unpoisoned(state);
            let SharedState {
                accumulator,
                tracker,
            } = &mut *guard;
            accumulator.merge(message.clone(), observer);
            tracker.observe_message(&message, observer);
        }
        ProtocolEvent::Finish { .. } => {
            lock_unpoisoned(state).tracker.finish_stream(observer);
        }
        ProtocolEvent::ModelChange { model, mode } => observer.on_model_change(&model, &mode),
        ProtocolEvent::Notification { request_id, text } => {
            observer.on_notification(&request_id, &text);
        }
        // The transport aborts on stream errors before forwarding them, and
        // pings exist only to reset the read timeout.
        ProtocolEvent::StreamError { .. } | ProtocolEvent::Ping => {}
    }
}

/// Sleeps in short steps so a cancellation lands within one poll interval.
pub(crate) async fn sleep_or_cancel(
    duration: Duration,
    cancellation: &CancellationSignal,
) -> Result<(), ()> {
    let deadline = tokio::time::Instant::now() + duration;

    loop {
        if cancellation.load(Ordering::Acquire) {
            return Err(());
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Ok(());
        }
        let step = (deadline - now).min(CANCEL_POLL_INTERVAL);
        tokio::time::sleep(step).await;
    }
}
