use std::time::Duration;

use stream_api::retry::{
    commit_retry_delay, is_retryable_http_status, FailureClass, TerminalCategory,
    MAX_COMMIT_RETRIES,
};

#[test]
fn retry_commit_delays_grow_linearly() {
    let delays: Vec<Duration> = (1..=MAX_COMMIT_RETRIES).map(commit_retry_delay).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(1000),
            Duration::from_millis(2000),
            Duration::from_millis(3000),
        ]
    );
}

#[test]
fn retry_status_policy_covers_429_and_5xx_only() {
    assert!(is_retryable_http_status(429));
    assert!(is_retryable_http_status(500));
    assert!(is_retryable_http_status(503));
    assert!(!is_retryable_http_status(400));
    assert!(!is_retryable_http_status(403));
    assert!(!is_retryable_http_status(404));
}

#[test]
fn retry_terminal_categories_follow_status() {
    assert_eq!(
        FailureClass::from_status(403),
        FailureClass::Terminal(TerminalCategory::Permission)
    );
    assert_eq!(
        FailureClass::from_status(422),
        FailureClass::Terminal(TerminalCategory::Generic)
    );
    assert_eq!(
        TerminalCategory::from_status(Some(502)),
        TerminalCategory::Server
    );
    assert_eq!(
        TerminalCategory::from_status(Some(429)),
        TerminalCategory::RateLimited
    );
    assert_eq!(TerminalCategory::from_status(None), TerminalCategory::Generic);
}
