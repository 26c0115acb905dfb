use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use conversation_model::Message;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use tracing::{debug, warn};

use crate::config::AgentApiConfig;
use crate::error::{parse_error_message, AgentApiError};
use crate::events::{FinishReason, ProtocolEvent};
use crate::headers::{build_headers, ACCEPT_EVENT_STREAM, ACCEPT_JSON};
use crate::payload::{StreamRequest, TranscriptResponse};
use crate::sse::EventStreamParser;
use crate::url::{stream_url, transcript_url};

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport client for one agent endpoint.
///
/// Holds no per-session state; a single client may serve many attempts.
#[derive(Debug)]
pub struct AgentClient {
    http: Client,
    config: AgentApiConfig,
}

impl AgentClient {
    pub fn new(config: AgentApiConfig) -> Result<Self, AgentApiError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(AgentApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AgentApiConfig {
        &self.config
    }

    pub fn build_stream_request(
        &self,
        request: &StreamRequest,
    ) -> Result<reqwest::RequestBuilder, AgentApiError> {
        let headers = self.header_map(ACCEPT_EVENT_STREAM)?;
        Ok(self
            .http
            .post(stream_url(
                &self.config.base_url,
                request.session_id.as_deref(),
            ))
            .headers(headers)
            .json(request))
    }

    /// Fetches the server's authoritative transcript for a session.
    pub async fn fetch_transcript(
        &self,
        session_id: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Vec<Message>, AgentApiError> {
        let headers = self.header_map(ACCEPT_JSON)?;
        let mut builder = self
            .http
            .get(transcript_url(&self.config.base_url, session_id))
            .headers(headers);
        if let Some(timeout) = self.config.fetch_timeout {
            builder = builder.timeout(timeout);
        }

        let response = await_or_cancel(builder.send(), cancellation)
            .await?
            .map_err(AgentApiError::from)?;
        let response = self.reject_error_status(response, cancellation).await?;

        let transcript = await_or_cancel(response.json::<TranscriptResponse>(), cancellation)
            .await?
            .map_err(AgentApiError::from)?;
        Ok(transcript.messages)
    }

    /// Runs one stream attempt to completion.
    ///
    /// Decoded events are handed to `on_event` synchronously, in arrival
    /// order; a slow handler blocks upstream reads rather than dropping or
    /// reordering. Malformed events below the configured threshold are
    /// skipped and logged; at the threshold the attempt aborts. Returns the
    /// finish reason when the server terminated the stream explicitly; a
    /// connection that closes without a finish event is a connectivity
    /// failure.
    pub async fn run_stream<F>(
        &self,
        request: &StreamRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<FinishReason, AgentApiError>
    where
        F: FnMut(ProtocolEvent),
    {
        let send = self.build_stream_request(request)?.send();
        let response = await_or_cancel(send, cancellation)
            .await?
            .map_err(AgentApiError::from)?;
        let response = self.reject_error_status(response, cancellation).await?;
        debug!(
            session_id = request.session_id.as_deref().unwrap_or("<new>"),
            "stream attempt connected"
        );

        let mut bytes = response.bytes_stream();
        let mut parser = EventStreamParser::default();
        let mut decode_errors = 0u32;
        let mut finish = None;

        loop {
            let read = tokio::time::timeout(self.config.read_timeout, bytes.next());
            let step = await_or_cancel(read, cancellation).await?;
            let chunk = match step {
                Err(_elapsed) => {
                    return Err(AgentApiError::Connectivity(format!(
                        "no stream event within {:?}",
                        self.config.read_timeout
                    )))
                }
                Ok(None) => break,
                Ok(Some(chunk)) => chunk.map_err(AgentApiError::from)?,
            };
            if is_cancelled(cancellation) {
                return Err(AgentApiError::Cancelled);
            }

            for item in parser.feed(&chunk) {
                match item {
                    Err(decode_error) => {
                        decode_errors += 1;
                        if decode_errors >= self.config.decode_error_threshold {
                            return Err(AgentApiError::DecodeThreshold {
                                count: decode_errors,
                                last: decode_error,
                            });
                        }
                        warn!(error = %decode_error, skipped = decode_errors, "skipping malformed stream event");
                    }
                    Ok(ProtocolEvent::StreamError { text }) => {
                        return Err(AgentApiError::StreamFailed { text });
                    }
                    Ok(ProtocolEvent::Finish { reason }) => {
                        finish = Some(reason);
                        on_event(ProtocolEvent::Finish { reason });
                    }
                    Ok(event) => on_event(event),
                }
            }
        }

        if is_cancelled(cancellation) {
            return Err(AgentApiError::Cancelled);
        }

        finish.ok_or_else(|| {
            AgentApiError::Connectivity("stream closed without a finish event".to_string())
        })
    }

    async fn reject_error_status(
        &self,
        response: Response,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, AgentApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .unwrap_or_default();
        Err(AgentApiError::from_status(
            status,
            parse_error_message(status, &body),
        ))
    }

    fn header_map(&self, accept: &str) -> Result<HeaderMap, AgentApiError> {
        let headers = build_headers(&self.config, accept)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| AgentApiError::InvalidHeader(format!("key: {key}")))?,
                HeaderValue::from_str(&value)
                    .map_err(|_| AgentApiError::InvalidHeader(format!("value for {key}")))?,
            );
        }
        Ok(out)
    }
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

/// Awaits a future while polling the cancellation signal.
///
/// Keeps every transport suspension point cancellable without wiring a
/// dedicated cancellation channel through reqwest.
async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, AgentApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(AgentApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(AgentApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
