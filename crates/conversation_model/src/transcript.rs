use std::collections::HashMap;

use thiserror::Error;

use crate::message::{ContentBlock, Message};

/// Result of merging one incoming message into a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The id was unseen; the message was appended.
    Inserted,
    /// The id was known and the merge changed the stored message.
    Updated,
    /// The id was known and the incoming content added nothing new.
    Unchanged,
}

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcript contains a duplicate message id '{id}'")]
    DuplicateId { id: String },

    #[error("replacement transcript has {incoming} messages but {local} are already held")]
    WouldShrink { local: usize, incoming: usize },
}

/// Ordered, id-indexed sequence of messages.
///
/// Ids are unique; order of first appearance is preserved; the transcript
/// only grows, except for the explicit wholesale replacement performed by
/// reconciliation ([`Transcript::replace_all`]).
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    index_by_id: HashMap<String, usize>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a transcript from an ordered message list, validating id
    /// uniqueness.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, TranscriptError> {
        let mut transcript = Self::new();
        for message in messages {
            if transcript.index_by_id.contains_key(&message.id) {
                return Err(TranscriptError::DuplicateId { id: message.id });
            }
            transcript.push_new(message);
        }
        Ok(transcript)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.index_by_id
            .get(id)
            .map(|&index| &self.messages[index])
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Merges one incoming message or fragment.
    ///
    /// Unknown ids append at the end. Known ids merge field-by-field: text is
    /// concatenated string-wise in arrival order, tool blocks are append-only
    /// keyed by kind plus call id, and visibility fills in only when absent.
    /// Redelivering content that is already present leaves the transcript
    /// untouched and reports [`MergeOutcome::Unchanged`].
    pub fn merge(&mut self, incoming: Message) -> MergeOutcome {
        let Some(&index) = self.index_by_id.get(&incoming.id) else {
            self.push_new(incoming);
            return MergeOutcome::Inserted;
        };

        let existing = &mut self.messages[index];

        // Whole-message redelivery: identical content adds nothing.
        if existing.content == incoming.content {
            if existing.visibility.is_none() && incoming.visibility.is_some() {
                existing.visibility = incoming.visibility;
                return MergeOutcome::Updated;
            }
            return MergeOutcome::Unchanged;
        }

        let mut changed = false;
        for block in incoming.content {
            match block {
                ContentBlock::Text { text } => {
                    if text.is_empty() {
                        continue;
                    }
                    changed = true;
                    match existing.content.iter_mut().find_map(|block| match block {
                        ContentBlock::Text { text } => Some(text),
                        _ => None,
                    }) {
                        Some(accumulated) => accumulated.push_str(&text),
                        None => existing.content.push(ContentBlock::Text { text }),
                    }
                }
                tool_block => {
                    let key = tool_block.tool_block_key();
                    let already_present = existing
                        .content
                        .iter()
                        .any(|block| block.tool_block_key() == key);
                    if !already_present {
                        existing.content.push(tool_block);
                        changed = true;
                    }
                }
            }
        }

        if existing.visibility.is_none() && incoming.visibility.is_some() {
            existing.visibility = incoming.visibility;
            changed = true;
        }

        if changed {
            MergeOutcome::Updated
        } else {
            MergeOutcome::Unchanged
        }
    }

    /// Replaces the whole transcript with an authoritative list.
    ///
    /// The replacement must be at least as long as the current transcript;
    /// reconciliation never moves the caller-visible transcript backward.
    /// Returns the newly-revealed suffix (messages beyond the previous
    /// length), in order.
    pub fn replace_all(
        &mut self,
        authoritative: Vec<Message>,
    ) -> Result<Vec<Message>, TranscriptError> {
        if authoritative.len() < self.messages.len() {
            return Err(TranscriptError::WouldShrink {
                local: self.messages.len(),
                incoming: authoritative.len(),
            });
        }

        let replacement = Self::from_messages(authoritative)?;
        let revealed = replacement.messages[self.messages.len()..].to_vec();
        *self = replacement;
        Ok(revealed)
    }

    fn push_new(&mut self, message: Message) {
        self.index_by_id
            .insert(message.id.clone(), self.messages.len());
        self.messages.push(message);
    }
}
