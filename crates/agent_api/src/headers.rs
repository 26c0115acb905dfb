use std::collections::BTreeMap;

use crate::config::AgentApiConfig;
use crate::error::AgentApiError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_USER_AGENT: &str = "user-agent";

pub const ACCEPT_EVENT_STREAM: &str = "text/event-stream";
pub const ACCEPT_JSON: &str = "application/json";

/// Build a deterministic header map for agent transport requests.
pub fn build_headers(
    config: &AgentApiConfig,
    accept: &str,
) -> Result<BTreeMap<String, String>, AgentApiError> {
    if config.access_token.trim().is_empty() {
        return Err(AgentApiError::MissingAccessToken);
    }

    let mut headers = BTreeMap::new();
    headers.insert(
        HEADER_AUTHORIZATION.to_owned(),
        format!("Bearer {}", config.access_token.trim()),
    );
    headers.insert(HEADER_ACCEPT.to_owned(), accept.to_owned());
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );

    let user_agent = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(concat!("conversation-engine/", env!("CARGO_PKG_VERSION")));
    headers.insert(HEADER_USER_AGENT.to_owned(), user_agent.to_owned());

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::{build_headers, ACCEPT_EVENT_STREAM, ACCEPT_JSON};
    use crate::config::AgentApiConfig;
    use crate::error::AgentApiError;

    #[test]
    fn bearer_and_accept_headers_are_set() {
        let config = AgentApiConfig::new("tok-123");
        let headers = build_headers(&config, ACCEPT_EVENT_STREAM).expect("headers build");

        assert_eq!(headers["authorization"], "Bearer tok-123");
        assert_eq!(headers["accept"], "text/event-stream");
        assert_eq!(headers["content-type"], "application/json");
        assert!(headers["user-agent"].starts_with("conversation-engine/"));
    }

    #[test]
    fn empty_token_is_rejected() {
        let config = AgentApiConfig::new("   ");
        let error = build_headers(&config, ACCEPT_JSON).expect_err("missing token must fail");
        assert!(matches!(error, AgentApiError::MissingAccessToken));
    }

    #[test]
    fn extra_headers_are_lowercased_and_merged() {
        let config = AgentApiConfig::new("tok").insert_header("X-Trace-Id", " abc ");
        let headers = build_headers(&config, ACCEPT_JSON).expect("headers build");
        assert_eq!(headers["x-trace-id"], "abc");
    }

    #[test]
    fn explicit_user_agent_wins() {
        let config = AgentApiConfig::new("tok").with_user_agent("client-shell/2.0");
        let headers = build_headers(&config, ACCEPT_JSON).expect("headers build");
        assert_eq!(headers["user-agent"], "client-shell/2.0");
    }
}
