/// Default base URL for a locally tunneled agent endpoint.
pub const DEFAULT_AGENT_BASE_URL: &str = "http://127.0.0.1:8787";

/// Normalize a caller-supplied base URL: empty input falls back to the
/// default, surrounding whitespace and trailing slashes are stripped.
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_AGENT_BASE_URL
    } else {
        input.trim()
    };

    base.trim_end_matches('/').to_string()
}

/// Endpoint producing the live event stream for a session.
///
/// Without a session id the request creates a new session server-side.
pub fn stream_url(base_url: &str, session_id: Option<&str>) -> String {
    let base = normalize_base_url(base_url);
    match session_id {
        Some(id) => format!("{base}/sessions/{id}/events"),
        None => format!("{base}/sessions/events"),
    }
}

/// Synchronous endpoint returning the full ordered transcript of a session.
pub fn transcript_url(base_url: &str, session_id: &str) -> String {
    let base = normalize_base_url(base_url);
    format!("{base}/sessions/{session_id}/transcript")
}
