use std::sync::Mutex;

use agent_api::{AgentApiError, CancellationSignal};
use conversation_model::Message;
use tracing::{debug, warn};

use crate::observer::{ConversationObserver, EngineWarning};
use crate::session::{lock_unpoisoned, SharedState};
use crate::transport::AgentTransport;

/// Relation of the server's authoritative transcript to the local one,
/// decided by length and id prefix — never by content heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TranscriptComparison {
    /// Server holds messages beyond the local end.
    Ahead,
    /// Same messages on both sides.
    Level,
    /// Server is missing messages the client already showed.
    Behind { server: usize },
    /// Ids disagree before the local end.
    Divergent { position: usize },
}

pub(crate) fn compare_transcripts(
    local: &[Message],
    server: &[Message],
) -> TranscriptComparison {
    for (position, (local_message, server_message)) in local.iter().zip(server).enumerate() {
        if local_message.id != server_message.id {
            return TranscriptComparison::Divergent { position };
        }
    }

    if server.len() > local.len() {
        TranscriptComparison::Ahead
    } else if server.len() == local.len() {
        TranscriptComparison::Level
    } else {
        TranscriptComparison::Behind {
            server: server.len(),
        }
    }
}

/// What reconciliation decided, paired with the message list the next
/// attempt should send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReconcileOutcome {
    /// The server already completed work beyond the local transcript; it was
    /// adopted and no retry is needed.
    Advanced { revealed: usize },
    /// No new work server-side; retry with the authoritative list.
    NoNewWork,
    /// The server was behind or divergent; a warning was raised and the
    /// local list is the retry basis.
    KeptLocal,
}

/// Fetches the authoritative transcript and diffs it against local state.
///
/// The state lock is taken only after the fetch resolves; no lock spans the
/// network call.
pub(crate) async fn reconcile(
    transport: &dyn AgentTransport,
    session_id: &str,
    cancellation: &CancellationSignal,
    state: &Mutex<SharedState>,
    observer: &dyn ConversationObserver,
) -> Result<(ReconcileOutcome, Vec<Message>), AgentApiError> {
    let server = transport.fetch_transcript(session_id, cancellation).await?;

    let mut guard = lock_unpoisoned(state);
    let local_len = guard.accumulator.transcript().len();
    let comparison = compare_transcripts(guard.accumulator.transcript().messages(), &server);

    match comparison {
        TranscriptComparison::Ahead => {
            let SharedState {
                accumulator,
                tracker,
            } = &mut *guard;
            match accumulator.adopt(server, observer) {
                Ok(revealed) => {
                    // Adopted content may complete calls the stream left
                    // hanging; the server's result wins over a timeout.
                    for message in &revealed {
                        tracker.observe_message(message, observer);
                    }
                    debug!(revealed = revealed.len(), "adopted server transcript");
                    Ok((
                        ReconcileOutcome::Advanced {
                            revealed: revealed.len(),
                        },
                        accumulator.transcript().to_vec(),
                    ))
                }
                Err(error) => {
                    warn!(%error, "server transcript rejected; keeping local view");
                    Ok((ReconcileOutcome::KeptLocal, accumulator.transcript().to_vec()))
                }
            }
        }
        TranscriptComparison::Level => Ok((ReconcileOutcome::NoNewWork, server)),
        TranscriptComparison::Behind { server: server_len } => {
            warn!(
                local = local_len,
                server = server_len,
                "server transcript shorter than local; keeping local view"
            );
            observer.on_warning(&EngineWarning::TranscriptRegression {
                local: local_len,
                server: server_len,
            });
            Ok((
                ReconcileOutcome::KeptLocal,
                guard.accumulator.transcript().to_vec(),
            ))
        }
        TranscriptComparison::Divergent { position } => {
            warn!(position, "server transcript diverges from local; keeping local view");
            observer.on_warning(&EngineWarning::TranscriptDivergence { position });
            Ok((
                ReconcileOutcome::KeptLocal,
                guard.accumulator.transcript().to_vec(),
            ))
        }
    }
}
