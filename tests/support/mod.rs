//! Scripted transport and recording observer shared by the engine tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_api::{
    AgentApiError, CancellationSignal, DecodeError, FinishReason, ProtocolEvent, StreamRequest,
};
use async_trait::async_trait;
use conversation_engine::{
    AgentTransport, ContentBlock, ConversationObserver, EngineStatus, EngineWarning, Message, Role,
    ToolCallState,
};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub fn at(raw: &str) -> OffsetDateTime {
    OffsetDateTime::parse(raw, &Rfc3339).expect("test timestamp")
}

pub fn text_message(id: &str, role: Role, created_at: OffsetDateTime, text: &str) -> Message {
    Message::new(id, role, created_at).with_block(ContentBlock::text(text))
}

pub fn fragment(id: &str, text: &str) -> ProtocolEvent {
    ProtocolEvent::MessageFragment {
        message: text_message(id, Role::Assistant, at("2026-07-01T10:00:00Z"), text),
    }
}

pub fn finish(reason: FinishReason) -> ProtocolEvent {
    ProtocolEvent::Finish { reason }
}

/// Errors the scripts can raise without constructing transport internals.
#[derive(Debug, Clone, Copy)]
pub enum ScriptedError {
    Connectivity,
    DecodeThreshold,
    Cancelled,
}

impl ScriptedError {
    fn build(self) -> AgentApiError {
        match self {
            Self::Connectivity => {
                AgentApiError::Connectivity("scripted connectivity failure".to_string())
            }
            Self::DecodeThreshold => AgentApiError::DecodeThreshold {
                count: 3,
                last: DecodeError::new("scripted malformed event"),
            },
            Self::Cancelled => AgentApiError::Cancelled,
        }
    }
}

/// One scripted stream attempt.
pub enum StreamScript {
    /// Deliver events, then report the finish reason they contained (or a
    /// connectivity failure if none did).
    Deliver(Vec<ProtocolEvent>),
    /// Deliver events, then fail the attempt.
    FailAfter(Vec<ProtocolEvent>, ScriptedError),
    /// Block until the cancellation signal fires.
    HangUntilCancelled,
}

/// One scripted transcript fetch.
pub enum FetchScript {
    Static(Result<Vec<Message>, ScriptedError>),
    /// Respond with the message list of the most recent stream request plus
    /// a suffix — used when the request contains client-generated ids the
    /// test cannot know up front.
    EchoRequestPlus(Vec<Message>),
}

#[derive(Default)]
pub struct FakeTransport {
    streams: Mutex<VecDeque<StreamScript>>,
    fetches: Mutex<VecDeque<FetchScript>>,
    pub stream_count: AtomicUsize,
    pub fetch_count: AtomicUsize,
    pub requests: Mutex<Vec<StreamRequest>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_stream(&self, script: StreamScript) {
        self.streams.lock().expect("stream scripts").push_back(script);
    }

    pub fn push_fetch(&self, script: FetchScript) {
        self.fetches.lock().expect("fetch scripts").push_back(script);
    }

    pub fn stream_count(&self) -> usize {
        self.stream_count.load(Ordering::Acquire)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::Acquire)
    }

    pub fn last_request(&self) -> Option<StreamRequest> {
        self.requests.lock().expect("requests").last().cloned()
    }
}

#[async_trait]
impl AgentTransport for FakeTransport {
    async fn run_stream(
        &self,
        request: &StreamRequest,
        cancellation: &CancellationSignal,
        on_event: &mut (dyn FnMut(ProtocolEvent) + Send),
    ) -> Result<FinishReason, AgentApiError> {
        self.stream_count.fetch_add(1, Ordering::AcqRel);
        self.requests
            .lock()
            .expect("requests")
            .push(request.clone());

        let script = self
            .streams
            .lock()
            .expect("stream scripts")
            .pop_front()
            .expect("unexpected stream attempt without a script");

        match script {
            StreamScript::Deliver(events) => {
                let mut finish = None;
                for event in events {
                    if let ProtocolEvent::Finish { reason } = &event {
                        finish = Some(*reason);
                    }
                    on_event(event);
                }
                finish.ok_or_else(|| {
                    AgentApiError::Connectivity("script ended without finish".to_string())
                })
            }
            StreamScript::FailAfter(events, error) => {
                for event in events {
                    on_event(event);
                }
                Err(error.build())
            }
            StreamScript::HangUntilCancelled => loop {
                if cancellation.load(Ordering::Acquire) {
                    return Err(AgentApiError::Cancelled);
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            },
        }
    }

    async fn fetch_transcript(
        &self,
        _session_id: &str,
        _cancellation: &CancellationSignal,
    ) -> Result<Vec<Message>, AgentApiError> {
        self.fetch_count.fetch_add(1, Ordering::AcqRel);

        let script = self
            .fetches
            .lock()
            .expect("fetch scripts")
            .pop_front()
            .expect("unexpected transcript fetch without a script");

        match script {
            FetchScript::Static(result) => result.map_err(ScriptedError::build),
            FetchScript::EchoRequestPlus(suffix) => {
                let mut messages = self
                    .requests
                    .lock()
                    .expect("requests")
                    .last()
                    .map(|request| request.messages.clone())
                    .unwrap_or_default();
                messages.extend(suffix);
                Ok(messages)
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub messages: Mutex<Vec<(String, Option<String>)>>,
    pub statuses: Mutex<Vec<EngineStatus>>,
    pub tool_updates: Mutex<Vec<(String, bool)>>,
    pub warnings: Mutex<Vec<EngineWarning>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn message_log(&self) -> Vec<(String, Option<String>)> {
        self.messages.lock().expect("messages").clone()
    }

    pub fn announcements_for(&self, id: &str) -> usize {
        self.message_log()
            .iter()
            .filter(|(message_id, _)| message_id == id)
            .count()
    }

    pub fn status_log(&self) -> Vec<EngineStatus> {
        self.statuses.lock().expect("statuses").clone()
    }

    pub fn warning_log(&self) -> Vec<EngineWarning> {
        self.warnings.lock().expect("warnings").clone()
    }
}

impl ConversationObserver for RecordingObserver {
    fn on_message(&self, message: &Message) {
        self.messages
            .lock()
            .expect("messages")
            .push((message.id.clone(), message.text().map(str::to_string)));
    }

    fn on_tool_update(&self, call_id: &str, state: &ToolCallState) {
        self.tool_updates
            .lock()
            .expect("tool updates")
            .push((call_id.to_string(), state.is_active()));
    }

    fn on_status(&self, status: &EngineStatus) {
        self.statuses
            .lock()
            .expect("statuses")
            .push(status.clone());
    }

    fn on_warning(&self, warning: &EngineWarning) {
        self.warnings
            .lock()
            .expect("warnings")
            .push(warning.clone());
    }
}
