use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Maximum commit retries after the initial attempt.
pub const MAX_COMMIT_RETRIES: u32 = 3;
/// Delay unit for commit retries; retry `n` waits `n` units.
pub const COMMIT_BASE_DELAY_MS: u64 = 1000;
/// Maximum `429` polls when opening a chat stream.
pub const MAX_BUSY_ATTEMPTS: u32 = 50;
/// Spacing between `429` polls.
pub const BUSY_POLL_INTERVAL_MS: u64 = 400;

fn transient_message_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)timed?.?out|rate.?limit|overloaded|service.?unavailable|connection.?(refused|reset|closed)|network")
            .expect("transient failure regex must compile")
    })
}

/// Status policy: `429` and every `5xx` are transient.
pub fn is_retryable_http_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

/// Error text policy for transport failures without a status.
pub fn is_transient_error_text(error_text: &str) -> bool {
    transient_message_regex().is_match(error_text)
}

/// Linear backoff: retry 1 waits 1 s, retry 2 waits 2 s, retry 3 waits 3 s.
pub fn commit_retry_delay(retry: u32) -> Duration {
    linear_delay(Duration::from_millis(COMMIT_BASE_DELAY_MS), retry)
}

pub fn linear_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(retry.max(1))
}

/// User-facing category of a failure that will not be retried (any more).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalCategory {
    Permission,
    RateLimited,
    Server,
    Generic,
}

impl TerminalCategory {
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(401 | 403) => Self::Permission,
            Some(429) => Self::RateLimited,
            Some(status) if (500..=599).contains(&status) => Self::Server,
            _ => Self::Generic,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Permission => "You don't have permission to save changes to this automation.",
            Self::RateLimited => "Too many save requests. Please wait a moment and try again.",
            Self::Server => "The server failed to save your changes. Please try again later.",
            Self::Generic => "Failed to save your changes.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Retryable,
    Terminal(TerminalCategory),
}

impl FailureClass {
    pub fn from_status(status: u16) -> Self {
        if is_retryable_http_status(status) {
            Self::Retryable
        } else {
            Self::Terminal(TerminalCategory::from_status(Some(status)))
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable)
    }
}

#[cfg(test)]
mod tests {
    use super::{is_transient_error_text, linear_delay};
    use std::time::Duration;

    #[test]
    fn zero_retry_is_treated_as_first_retry() {
        assert_eq!(
            linear_delay(Duration::from_millis(400), 0),
            Duration::from_millis(400)
        );
    }

    #[test]
    fn transient_text_matches_connection_failures() {
        assert!(is_transient_error_text("error sending request: connection refused"));
        assert!(is_transient_error_text("operation timed out"));
        assert!(!is_transient_error_text("invalid automation id"));
    }
}
