mod support;

use std::sync::Arc;
use std::time::Duration;

use agent_api::FinishReason;
use conversation_engine::{
    ConversationObserver, ConversationSession, EngineConfig, EngineError, EngineStatus,
    EngineWarning, Role, ToolCallState, ToolStatus,
};
use conversation_model::{ContentBlock, Message, ToolValue};
use support::{
    at, finish, fragment, FakeTransport, FetchScript, RecordingObserver, ScriptedError,
    StreamScript,
};

fn session_with(
    transport: &Arc<FakeTransport>,
    observer: &Arc<RecordingObserver>,
    initial: Vec<Message>,
) -> ConversationSession {
    ConversationSession::start(
        EngineConfig::default(),
        Arc::clone(transport) as Arc<dyn conversation_engine::AgentTransport>,
        Arc::clone(observer) as Arc<dyn ConversationObserver>,
        initial,
        Some("s-1".to_string()),
    )
    .expect("session starts from valid history")
}

#[tokio::test(start_paused = true)]
async fn fragments_accumulate_into_one_message_until_finish() {
    let transport = FakeTransport::new();
    let observer = RecordingObserver::new();
    transport.push_stream(StreamScript::Deliver(vec![
        fragment("m2", "Hel"),
        fragment("m2", "lo"),
        finish(FinishReason::Complete),
    ]));

    let session = session_with(&transport, &observer, Vec::new());
    let reason = session
        .send_message("hi")
        .await
        .expect("stream should complete");

    assert_eq!(reason, FinishReason::Complete);
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, Role::User);
    assert_eq!(transcript[1].id, "m2");
    assert_eq!(transcript[1].text(), Some("Hello"));

    let statuses = observer.status_log();
    assert!(statuses.contains(&EngineStatus::Connecting));
    assert!(statuses.contains(&EngineStatus::Streaming));
    assert!(matches!(
        statuses.last(),
        Some(EngineStatus::Completed {
            reason: FinishReason::Complete
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn duplicate_fragment_delivery_is_not_reannounced() {
    let transport = FakeTransport::new();
    let observer = RecordingObserver::new();
    transport.push_stream(StreamScript::Deliver(vec![
        fragment("m2", "Hello"),
        fragment("m2", "Hello"),
        finish(FinishReason::Complete),
    ]));

    let session = session_with(&transport, &observer, Vec::new());
    session
        .send_message("hi")
        .await
        .expect("stream should complete");

    assert_eq!(session.transcript()[1].text(), Some("Hello"));
    assert_eq!(observer.announcements_for("m2"), 1);
}

#[tokio::test(start_paused = true)]
async fn two_connectivity_failures_back_off_one_then_two_seconds() {
    let transport = FakeTransport::new();
    let observer = RecordingObserver::new();
    transport.push_stream(StreamScript::FailAfter(
        Vec::new(),
        ScriptedError::Connectivity,
    ));
    transport.push_stream(StreamScript::FailAfter(
        Vec::new(),
        ScriptedError::Connectivity,
    ));
    transport.push_stream(StreamScript::Deliver(vec![finish(FinishReason::Complete)]));
    // Reconciliation fetches fail transiently; the controller keeps the
    // local list and still backs off before each fresh attempt.
    transport.push_fetch(FetchScript::Static(Err(ScriptedError::Connectivity)));
    transport.push_fetch(FetchScript::Static(Err(ScriptedError::Connectivity)));

    let session = session_with(&transport, &observer, Vec::new());
    let started = tokio::time::Instant::now();
    session
        .send_message("hi")
        .await
        .expect("third attempt should complete");

    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(transport.stream_count(), 3);
    assert_eq!(transport.fetch_count(), 2);

    let statuses = observer.status_log();
    assert!(statuses.contains(&EngineStatus::Reconnecting { attempt: 1 }));
    assert!(statuses.contains(&EngineStatus::Reconnecting { attempt: 2 }));
}

#[tokio::test(start_paused = true)]
async fn reconciliation_adopts_server_side_tool_completion() {
    let transport = FakeTransport::new();
    let observer = RecordingObserver::new();

    let request_fragment = tool_request_fragment("m2", "t1");
    transport.push_stream(StreamScript::FailAfter(
        vec![request_fragment],
        ScriptedError::Connectivity,
    ));
    // The server finished the call while we were gone: its transcript holds
    // everything we sent, the request message and a response message.
    transport.push_fetch(FetchScript::EchoRequestPlus(vec![
        tool_request_message("m2", "t1"),
        tool_response_message("m3", "t1"),
    ]));

    let session = session_with(&transport, &observer, Vec::new());
    let reason = session
        .send_message("find it")
        .await
        .expect("reconciliation should complete the send");

    assert_eq!(reason, FinishReason::Complete);
    // No second attempt: resending would discard the server's work.
    assert_eq!(transport.stream_count(), 1);

    let calls = session.tool_calls();
    assert_eq!(calls.len(), 1);
    let (call_id, state) = &calls[0];
    assert_eq!(call_id, "t1");
    assert!(matches!(
        state,
        ToolCallState::Completed { result, .. } if result.status == ToolStatus::Success
    ));
    assert_eq!(observer.announcements_for("m3"), 1);
}

#[tokio::test(start_paused = true)]
async fn shorter_server_transcript_warns_and_never_shrinks_local_view() {
    let transport = FakeTransport::new();
    let observer = RecordingObserver::new();
    transport.push_stream(StreamScript::FailAfter(
        Vec::new(),
        ScriptedError::Connectivity,
    ));
    transport.push_stream(StreamScript::Deliver(vec![finish(FinishReason::Complete)]));
    transport.push_fetch(FetchScript::Static(Ok(Vec::new())));

    let session = session_with(&transport, &observer, Vec::new());
    let before = session.transcript().len();
    session
        .send_message("hi")
        .await
        .expect("retry should complete");

    assert!(session.transcript().len() >= before);
    assert_eq!(
        observer.warning_log(),
        vec![EngineWarning::TranscriptRegression {
            local: 1,
            server: 0
        }]
    );
    assert_eq!(transport.stream_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_prevents_any_retry() {
    let transport = FakeTransport::new();
    let observer = RecordingObserver::new();
    transport.push_stream(StreamScript::FailAfter(
        Vec::new(),
        ScriptedError::Connectivity,
    ));
    transport.push_fetch(FetchScript::Static(Err(ScriptedError::Connectivity)));

    let session = session_with(&transport, &observer, Vec::new());
    let send = tokio::spawn({
        let session = session.clone();
        async move { session.send_message("hi").await }
    });

    // Land inside the 1s backoff sleep, then cancel.
    tokio::time::sleep(Duration::from_millis(300)).await;
    session.cancel();

    let result = send.await.expect("send task should resolve");
    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert_eq!(transport.stream_count(), 1);
    assert!(matches!(
        observer.status_log().last(),
        Some(EngineStatus::Cancelled)
    ));
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_stream_tears_down_without_retry() {
    let transport = FakeTransport::new();
    let observer = RecordingObserver::new();
    transport.push_stream(StreamScript::HangUntilCancelled);

    let session = session_with(&transport, &observer, Vec::new());
    let send = tokio::spawn({
        let session = session.clone();
        async move { session.send_message("hi").await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    session.cancel();

    let result = send.await.expect("send task should resolve");
    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert_eq!(transport.stream_count(), 1);
    assert_eq!(transport.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_failure_surfaces_without_reconciliation() {
    let transport = FakeTransport::new();
    let observer = RecordingObserver::new();
    transport.push_stream(StreamScript::FailAfter(
        Vec::new(),
        ScriptedError::DecodeThreshold,
    ));

    let session = session_with(&transport, &observer, Vec::new());
    let result = session.send_message("hi").await;

    assert!(matches!(result, Err(EngineError::Transport(_))));
    assert_eq!(transport.stream_count(), 1);
    assert_eq!(transport.fetch_count(), 0);
    assert!(observer
        .status_log()
        .iter()
        .any(|status| matches!(status, EngineStatus::Failed { .. })));
}

#[tokio::test(start_paused = true)]
async fn retry_request_body_uses_the_reconciled_transcript() {
    let transport = FakeTransport::new();
    let observer = RecordingObserver::new();
    transport.push_stream(StreamScript::FailAfter(
        Vec::new(),
        ScriptedError::Connectivity,
    ));
    transport.push_stream(StreamScript::Deliver(vec![finish(FinishReason::Complete)]));
    // Equal-length fetch: the authoritative list becomes the retry basis.
    transport.push_fetch(FetchScript::EchoRequestPlus(Vec::new()));

    let session = session_with(&transport, &observer, Vec::new());
    session
        .send_message("hi")
        .await
        .expect("retry should complete");

    let requests = transport.requests.lock().expect("requests");
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].messages.len(), requests[1].messages.len());
    assert_eq!(
        requests[1].session_id.as_deref(),
        Some("s-1"),
        "retries stay on the same session"
    );
}

fn tool_request_fragment(message_id: &str, call_id: &str) -> conversation_engine::ProtocolEvent {
    conversation_engine::ProtocolEvent::MessageFragment {
        message: tool_request_message(message_id, call_id),
    }
}

fn tool_request_message(message_id: &str, call_id: &str) -> Message {
    Message::new(message_id, Role::Assistant, at("2026-07-01T10:00:01Z")).with_block(
        ContentBlock::ToolRequest {
            id: call_id.to_string(),
            name: "search".to_string(),
            arguments: ToolValue::Map(vec![(
                "query".to_string(),
                ToolValue::string("rust streams"),
            )]),
        },
    )
}

fn tool_response_message(message_id: &str, call_id: &str) -> Message {
    Message::new(message_id, Role::Assistant, at("2026-07-01T10:00:04Z")).with_block(
        ContentBlock::ToolResponse {
            id: call_id.to_string(),
            status: ToolStatus::Success,
            value: Some(ToolValue::string("three matches")),
            error: None,
        },
    )
}
