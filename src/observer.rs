use std::time::Duration;

use automation_model::{
    AssembledMessage, DocumentCheckpoint, EnvVariable, StepFile, TriggerMode,
};
use serde_json::Value;

use crate::baseline::DiffStats;
use crate::commit::CommitOutcome;
use crate::guard::PlaceholderRule;

/// Notifications published by a [`crate::ChatEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SendStarted {
        generation: u64,
    },
    MessagesChanged {
        messages: Vec<AssembledMessage>,
    },
    StepsChanged {
        steps: Vec<StepFile>,
    },
    VariablesChanged {
        variables: Vec<EnvVariable>,
    },
    /// Full document state after an accepted mutation.
    Checkpoint(DocumentCheckpoint),
    ScheduleChanged {
        mode: TriggerMode,
    },
    PlaceholderRejected {
        step_id: String,
        rule: PlaceholderRule,
        count: u32,
    },
    AutoRetryScheduled {
        step_id: String,
        attempt: u32,
        delay: Duration,
    },
    ManualRetryAvailable {
        step_id: String,
        message: String,
    },
    DiffPending {
        step_id: String,
        stats: DiffStats,
    },
    ChangesAccepted {
        step_id: String,
        content: String,
    },
    ChangesRejected {
        step_id: String,
        content: String,
    },
    CommitFinished {
        outcome: CommitOutcome,
    },
    UpgradeRequired {
        payload: Value,
    },
    Status {
        text: String,
    },
    SendFinished {
        generation: u64,
        cancelled: bool,
    },
}

pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

impl<F> SessionObserver for F
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: &SessionEvent) {
        self(event)
    }
}
