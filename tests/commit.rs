mod support;

use std::time::Duration;

use automation_model::Dependency;
use stepwright::{CommitManager, CommitOutcome, CommitPolicy, CommitRequest};
use stream_api::retry::TerminalCategory;
use stream_api::{CommitBody, CommitFile, CommitPayload};

use support::ScriptedCommits;

fn payload(code: &str) -> CommitPayload {
    CommitPayload {
        automation_id: "auto-1".to_owned(),
        body: CommitBody::Files(vec![CommitFile {
            id: "s1".to_owned(),
            name: "Fetch".to_owned(),
            code: code.to_owned(),
            order: 1,
        }]),
        dependencies: vec![Dependency::latest("zod")],
        environment_variables: Vec::new(),
        change_description: "AI update".to_owned(),
    }
}

fn request(code: &str) -> CommitRequest {
    CommitRequest::new("auto-1", 0, payload(code))
}

#[tokio::test(start_paused = true)]
async fn commit_server_errors_back_off_linearly_then_give_up() {
    let backend = ScriptedCommits::with_statuses(&[500, 500, 500, 500]);
    let manager = CommitManager::new(backend.clone(), CommitPolicy::default());

    let outcome = manager.submit(request("a()")).await;

    assert_eq!(backend.call_count(), 4);
    assert_eq!(backend.gaps_ms(), vec![1000, 2000, 3000]);
    match outcome {
        CommitOutcome::Failed(failure) => {
            assert_eq!(failure.category, TerminalCategory::Server);
            assert_eq!(failure.status, Some(500));
            assert_eq!(failure.retries, 3);
            assert_eq!(
                failure.user_message(),
                "The server failed to save your changes. Please try again later."
            );
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(manager.in_flight_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn commit_rate_limit_is_retried_until_success() {
    let backend = ScriptedCommits::with_statuses(&[429, 503]);
    let manager = CommitManager::new(backend.clone(), CommitPolicy::default());

    let outcome = manager.submit(request("a()")).await;

    assert_eq!(
        outcome,
        CommitOutcome::Committed {
            version: Some(3),
            retries: 2
        }
    );
    assert_eq!(backend.gaps_ms(), vec![1000, 2000]);
}

#[tokio::test(start_paused = true)]
async fn commit_forbidden_is_never_retried() {
    let backend = ScriptedCommits::with_statuses(&[403]);
    let manager = CommitManager::new(backend.clone(), CommitPolicy::default());

    let outcome = manager.submit(request("a()")).await;

    assert_eq!(backend.call_count(), 1);
    assert!(matches!(
        outcome,
        CommitOutcome::Failed(ref failure)
            if failure.category == TerminalCategory::Permission && failure.retries == 0
    ));
}

#[tokio::test(start_paused = true)]
async fn commit_other_client_errors_are_terminal() {
    let backend = ScriptedCommits::with_statuses(&[422]);
    let manager = CommitManager::new(backend.clone(), CommitPolicy::default());

    let outcome = manager.submit(request("a()")).await;

    assert_eq!(backend.call_count(), 1);
    assert!(matches!(
        outcome,
        CommitOutcome::Failed(ref failure) if failure.category == TerminalCategory::Generic
    ));
}

#[tokio::test(start_paused = true)]
async fn commit_same_key_in_flight_is_deduplicated() {
    let backend = ScriptedCommits::with_statuses(&[500]);
    let manager = CommitManager::new(backend.clone(), CommitPolicy::default());

    let (first, second) = tokio::join!(
        manager.submit(request("a()")),
        manager.submit(request("a()"))
    );

    assert!(first.is_committed());
    assert_eq!(second, CommitOutcome::Deduplicated);
    assert_eq!(backend.call_count(), 2);

    let again = manager.submit(request("a()")).await;
    assert!(again.is_committed());
}

#[tokio::test(start_paused = true)]
async fn commit_distinct_keys_run_concurrently() {
    let backend = ScriptedCommits::with_statuses(&[500, 500]);
    let manager = CommitManager::new(backend.clone(), CommitPolicy::default());
    let started = tokio::time::Instant::now();

    let (first, second) = tokio::join!(
        manager.submit(request("a()")),
        manager.submit(request("longer()"))
    );

    assert!(first.is_committed());
    assert!(second.is_committed());
    assert_eq!(backend.call_count(), 4);
    assert!(started.elapsed() < Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn commit_policy_is_configurable() {
    let backend = ScriptedCommits::with_statuses(&[500, 500]);
    let policy = CommitPolicy {
        max_retries: 1,
        base_delay: Duration::from_millis(250),
    };
    let manager = CommitManager::new(backend.clone(), policy);

    let outcome = manager.submit(request("a()")).await;

    assert_eq!(backend.gaps_ms(), vec![250]);
    assert!(matches!(outcome, CommitOutcome::Failed(ref failure) if failure.retries == 1));
}
