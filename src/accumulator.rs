use conversation_model::{Message, MergeOutcome, Transcript, TranscriptError};

use crate::observer::ConversationObserver;

/// Folds message-bearing events into the growing transcript and notifies the
/// observer after every successful merge.
///
/// The accumulator owns the transcript for one logical session. It never
/// touches tool-call state; the tracker reacts to the same content blocks
/// independently.
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    transcript: Transcript,
}

impl MessageAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the transcript from messages the caller already holds. No
    /// observer notifications are emitted; the caller knows these messages.
    pub fn seeded(initial: Vec<Message>) -> Result<Self, TranscriptError> {
        Ok(Self {
            transcript: Transcript::from_messages(initial)?,
        })
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Merges one incoming message or fragment and notifies the observer
    /// with the post-merge snapshot. Redelivered duplicates change nothing
    /// and are not re-announced.
    pub fn merge(&mut self, message: Message, observer: &dyn ConversationObserver) -> MergeOutcome {
        let id = message.id.clone();
        let outcome = self.transcript.merge(message);

        if outcome != MergeOutcome::Unchanged {
            if let Some(updated) = self.transcript.get(&id) {
                observer.on_message(updated);
            }
        }

        outcome
    }

    /// Adopts the server's authoritative transcript wholesale, notifying the
    /// observer once per newly-revealed message, in order.
    ///
    /// Replacement — rather than re-merging — is deliberate: the merge rule
    /// appends text, and re-merging a longer server copy of a partially
    /// streamed message would duplicate its prefix.
    pub fn adopt(
        &mut self,
        authoritative: Vec<Message>,
        observer: &dyn ConversationObserver,
    ) -> Result<Vec<Message>, TranscriptError> {
        let revealed = self.transcript.replace_all(authoritative)?;
        for message in &revealed {
            observer.on_message(message);
        }
        Ok(revealed)
    }
}
