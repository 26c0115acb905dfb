use std::collections::HashMap;

use conversation_model::{ContentBlock, Message, ToolStatus, ToolValue};
use time::OffsetDateTime;
use tracing::debug;

use crate::observer::ConversationObserver;

/// Result attached to a completed tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    pub status: ToolStatus,
    pub value: Option<ToolValue>,
    pub error: Option<String>,
}

impl ToolCallResult {
    fn timeout() -> Self {
        Self {
            status: ToolStatus::Timeout,
            value: None,
            error: Some("tool call was still active when the stream finished".to_string()),
        }
    }
}

/// Lifecycle state of one tool call, keyed by its call id.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallState {
    Active {
        name: String,
        arguments: ToolValue,
        started_at: OffsetDateTime,
    },
    Completed {
        name: String,
        arguments: ToolValue,
        result: ToolCallResult,
        started_at: OffsetDateTime,
        completed_at: OffsetDateTime,
    },
}

impl ToolCallState {
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Active { name, .. } | Self::Completed { name, .. } => name,
        }
    }

    /// Wall-clock duration of a completed call.
    #[must_use]
    pub fn duration(&self) -> Option<time::Duration> {
        match self {
            Self::Active { .. } => None,
            Self::Completed {
                started_at,
                completed_at,
                ..
            } => Some(*completed_at - *started_at),
        }
    }
}

/// Derives tool invocation/completion state from message content as it is
/// accumulated.
///
/// Owns the state exclusively; the accumulator only forwards the content
/// blocks it reacts to. The owning message id is recorded once, at request
/// time, for downstream correlation.
#[derive(Debug, Default)]
pub struct ToolCallTracker {
    calls: HashMap<String, ToolCallState>,
    owners: HashMap<String, String>,
    order: Vec<String>,
}

impl ToolCallTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, call_id: &str) -> Option<&ToolCallState> {
        self.calls.get(call_id)
    }

    /// Message that introduced the call, recorded at request time.
    #[must_use]
    pub fn owner(&self, call_id: &str) -> Option<&str> {
        self.owners.get(call_id).map(String::as_str)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.calls.values().filter(|state| state.is_active()).count()
    }

    /// Snapshot in call-creation order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, ToolCallState)> {
        self.order
            .iter()
            .filter_map(|id| self.calls.get(id).map(|state| (id.clone(), state.clone())))
            .collect()
    }

    /// Reacts to the tool blocks of one message or fragment.
    ///
    /// Requests for unseen ids open `Active` entries; responses complete
    /// them. A response for an id never requested is ignored — the server is
    /// authoritative, but the client must not fabricate a call it never saw.
    pub fn observe_message(&mut self, message: &Message, observer: &dyn ConversationObserver) {
        for block in &message.content {
            match block {
                ContentBlock::ToolRequest {
                    id,
                    name,
                    arguments,
                } => {
                    if self.calls.contains_key(id) {
                        continue;
                    }
                    let state = ToolCallState::Active {
                        name: name.clone(),
                        arguments: arguments.clone(),
                        started_at: OffsetDateTime::now_utc(),
                    };
                    self.calls.insert(id.clone(), state);
                    self.owners.insert(id.clone(), message.id.clone());
                    self.order.push(id.clone());
                    self.notify(id, observer);
                }
                ContentBlock::ToolResponse {
                    id,
                    status,
                    value,
                    error,
                } => {
                    let result = ToolCallResult {
                        status: *status,
                        value: value.clone(),
                        error: error.clone(),
                    };
                    if !self.complete(id, result) {
                        debug!(call_id = %id, "ignoring tool response for unknown call");
                        continue;
                    }
                    self.notify(id, observer);
                }
                ContentBlock::Text { .. } | ContentBlock::ToolConfirmationRequest { .. } => {}
            }
        }
    }

    /// Force-completes every still-active call with a synthetic timeout
    /// result. Called when a stream finishes; guarantees no call is left
    /// permanently in progress.
    pub fn finish_stream(&mut self, observer: &dyn ConversationObserver) {
        let active: Vec<String> = self
            .order
            .iter()
            .filter(|id| self.calls.get(*id).is_some_and(ToolCallState::is_active))
            .cloned()
            .collect();

        for id in active {
            if self.complete(&id, ToolCallResult::timeout()) {
                self.notify(&id, observer);
            }
        }
    }

    fn complete(&mut self, call_id: &str, result: ToolCallResult) -> bool {
        match self.calls.get_mut(call_id) {
            Some(ToolCallState::Active {
                name,
                arguments,
                started_at,
            }) => {
                let completed = ToolCallState::Completed {
                    name: std::mem::take(name),
                    arguments: std::mem::replace(arguments, ToolValue::Null),
                    result,
                    started_at: *started_at,
                    completed_at: OffsetDateTime::now_utc(),
                };
                self.calls.insert(call_id.to_string(), completed);
                true
            }
            _ => false,
        }
    }

    fn notify(&self, call_id: &str, observer: &dyn ConversationObserver) {
        if let Some(state) = self.calls.get(call_id) {
            observer.on_tool_update(call_id, state);
        }
    }
}
