//! Streaming reconciliation engine for conversationally authored automations.
//!
//! A backend streams model output as newline-delimited JSON frames. The engine
//! merges them into messages, applies step tool calls to the workspace at most
//! once each, rejects code containing elision placeholders (with a bounded
//! automatic retry), keeps a review baseline per step, and commits the result
//! with deduplication and linear backoff.
//!
//! # Public API Overview
//! - Build a [`ChatEngine`] with [`EngineBuilder`], injecting a [`ChatTransport`],
//!   a [`CommitBackend`] and optionally a [`VariableStore`] and observers.
//! - Drive it with [`ChatEngine::send`], review with [`ChatEngine::accept`] and
//!   [`ChatEngine::reject`], and listen through [`SessionObserver`].
//! - The building blocks ([`MessageLog`], [`StepReconciler`], [`BaselineSet`],
//!   [`CommitManager`], [`RetryController`]) are usable on their own.

use std::sync::{Mutex, MutexGuard};

pub mod baseline;
pub mod commit;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod http;
pub mod merge;
pub mod observer;
pub mod reconcile;
pub mod session;
pub mod timers;
pub mod variables;

pub use crate::baseline::{diff_stats, BaselineSet, DiffStats, FileBaseline};
pub use crate::commit::{
    CommitBackend, CommitFailure, CommitManager, CommitOutcome, CommitRequest, DedupeKey,
};
pub use crate::config::{CommitPolicy, EngineConfig, WorkspaceMode};
pub use crate::engine::{
    ChatEngine, ChatTransport, EmptyVariableStore, EngineBuilder, SendOrigin, SendRequest,
    SendSummary, VariableStore,
};
pub use crate::error::EngineError;
pub use crate::guard::{
    compose_retry_message, contains_placeholder, detect_placeholder, PlaceholderRule,
    RejectionRecord, RetryController, RetryDecision, MAX_AUTO_RETRIES,
};
pub use crate::merge::MessageLog;
pub use crate::observer::{SessionEvent, SessionObserver};
pub use crate::reconcile::{OperationKey, ReconcileOutcome, StepReconciler, ToolAction};
pub use crate::session::{ChatSession, FrameEffects, PendingRetry, Workspace};
pub use crate::timers::TimerSet;

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
