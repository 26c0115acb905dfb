use agent_api::{
    AgentApiConfig, AgentApiError, AgentClient, CancellationSignal, FinishReason, ProtocolEvent,
    StreamRequest,
};
use async_trait::async_trait;
use conversation_model::Message;

/// Seam between the engine and the wire.
///
/// The engine depends on this trait rather than on `AgentClient` directly so
/// controller and poller behavior can be exercised against scripted fakes.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Runs one stream attempt, delivering decoded events in arrival order.
    async fn run_stream(
        &self,
        request: &StreamRequest,
        cancellation: &CancellationSignal,
        on_event: &mut (dyn FnMut(ProtocolEvent) + Send),
    ) -> Result<FinishReason, AgentApiError>;

    /// Fetches the server's authoritative transcript.
    async fn fetch_transcript(
        &self,
        session_id: &str,
        cancellation: &CancellationSignal,
    ) -> Result<Vec<Message>, AgentApiError>;
}

/// Production transport backed by [`AgentClient`].
#[derive(Debug)]
pub struct HttpTransport {
    client: AgentClient,
}

impl HttpTransport {
    pub fn new(config: AgentApiConfig) -> Result<Self, AgentApiError> {
        Ok(Self {
            client: AgentClient::new(config)?,
        })
    }

    #[must_use]
    pub fn client(&self) -> &AgentClient {
        &self.client
    }
}

#[async_trait]
impl AgentTransport for HttpTransport {
    async fn run_stream(
        &self,
        request: &StreamRequest,
        cancellation: &CancellationSignal,
        on_event: &mut (dyn FnMut(ProtocolEvent) + Send),
    ) -> Result<FinishReason, AgentApiError> {
        self.client
            .run_stream(request, Some(cancellation), |event| on_event(event))
            .await
    }

    async fn fetch_transcript(
        &self,
        session_id: &str,
        cancellation: &CancellationSignal,
    ) -> Result<Vec<Message>, AgentApiError> {
        self.client
            .fetch_transcript(session_id, Some(cancellation))
            .await
    }
}
