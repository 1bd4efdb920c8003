use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use stream_api::retry::{linear_delay, FailureClass, TerminalCategory};
use stream_api::{CommitPayload, CommitReceipt, StreamApiError};
use tracing::{debug, info, warn};

use crate::config::CommitPolicy;
use crate::lock_unpoisoned;

/// Persistence collaborator. One call is one attempt; retries live in
/// [`CommitManager`].
pub trait CommitBackend: Send + Sync {
    fn commit(&self, payload: CommitPayload)
        -> BoxFuture<'_, Result<CommitReceipt, StreamApiError>>;
}

/// Identity of one logical change; equal keys never commit concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupeKey {
    pub target: String,
    pub old_len: usize,
    pub new_len: usize,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub dedupe_key: DedupeKey,
    pub payload: CommitPayload,
    pub retry_count: u32,
}

impl CommitRequest {
    /// `old_len` is the content length the change starts from.
    pub fn new(target: impl Into<String>, old_len: usize, payload: CommitPayload) -> Self {
        Self {
            dedupe_key: DedupeKey {
                target: target.into(),
                old_len,
                new_len: payload.body.content_len(),
                description: payload.change_description.clone(),
            },
            payload,
            retry_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailure {
    pub category: TerminalCategory,
    pub status: Option<u16>,
    pub retries: u32,
    pub detail: String,
}

impl CommitFailure {
    pub fn user_message(&self) -> &'static str {
        self.category.user_message()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { version: Option<u64>, retries: u32 },
    /// The same change was already in flight.
    Deduplicated,
    Failed(CommitFailure),
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

#[derive(Clone)]
pub struct CommitManager {
    backend: Arc<dyn CommitBackend>,
    policy: CommitPolicy,
    in_flight: Arc<Mutex<HashSet<DedupeKey>>>,
}

impl CommitManager {
    pub fn new(backend: Arc<dyn CommitBackend>, policy: CommitPolicy) -> Self {
        Self {
            backend,
            policy,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn policy(&self) -> CommitPolicy {
        self.policy
    }

    pub fn is_in_flight(&self, key: &DedupeKey) -> bool {
        lock_unpoisoned(&self.in_flight).contains(key)
    }

    pub fn in_flight_len(&self) -> usize {
        lock_unpoisoned(&self.in_flight).len()
    }

    /// Commits `request`, retrying transient failures with linear backoff.
    pub async fn submit(&self, mut request: CommitRequest) -> CommitOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, request.dedupe_key.clone())
        else {
            debug!(target = %request.dedupe_key.target, "commit already in flight");
            return CommitOutcome::Deduplicated;
        };

        loop {
            let error = match self.backend.commit(request.payload.clone()).await {
                Ok(receipt) => {
                    info!(
                        target = %request.dedupe_key.target,
                        version = ?receipt.version,
                        retries = request.retry_count,
                        "commit succeeded"
                    );
                    return CommitOutcome::Committed {
                        version: receipt.version,
                        retries: request.retry_count,
                    };
                }
                Err(error) => error,
            };

            let class = error.classify();
            if class.is_retryable() && request.retry_count < self.policy.max_retries {
                request.retry_count += 1;
                let delay = linear_delay(self.policy.base_delay, request.retry_count);
                warn!(
                    target = %request.dedupe_key.target,
                    retry = request.retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "commit failed, retrying: {error}"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let category = match class {
                FailureClass::Terminal(category) => category,
                FailureClass::Retryable => TerminalCategory::from_status(error.status()),
            };
            warn!(
                target = %request.dedupe_key.target,
                retries = request.retry_count,
                "commit failed: {error}"
            );
            return CommitOutcome::Failed(CommitFailure {
                category,
                status: error.status(),
                retries: request.retry_count,
                detail: error.to_string(),
            });
        }
    }
}

/// Holds a dedupe key in the in-flight set until dropped.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<DedupeKey>>>,
    key: DedupeKey,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<DedupeKey>>>, key: DedupeKey) -> Option<Self> {
        if !lock_unpoisoned(set).insert(key.clone()) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            key,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock_unpoisoned(&self.set).remove(&self.key);
    }
}
