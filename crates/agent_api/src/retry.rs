use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Default cap on the exponential reconnect delay.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(30);

fn transient_error_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|overloaded|service.?unavailable|upstream.?connect|connection.?refused|connection.?reset|temporarily.?unavailable")
            .expect("transient-error regex must compile")
    })
}

/// HTTP status classification: remote-server errors and throttling retry,
/// other client errors do not.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

/// Error-text policy for transient transport failures.
pub fn is_transient_error_text(error_text: &str) -> bool {
    transient_error_regex().is_match(error_text)
}

/// Delay before reconnect attempt `attempt` (0-based): `min(2^attempt, cap)`
/// seconds. There is no attempt ceiling; reachability is outside the
/// engine's control, so capped indefinite backoff beats a terminal error.
pub fn reconnect_delay(attempt: u32, cap: Duration) -> Duration {
    let exponent = attempt.min(30);
    let delay = Duration::from_secs(2u64.saturating_pow(exponent));
    delay.min(cap)
}
