//! Shared document model for conversational automation authoring.
//!
//! This crate defines only the records that flow between the wire decoder, the
//! reconciliation engine, and persistence: assembled chat messages, tool-call
//! records, the ordered step list, environment variables, dependencies, and the
//! document checkpoint. It carries no transport or engine behavior.

use std::sync::{atomic::AtomicBool, Arc};

mod checkpoint;
mod message;
mod step;
mod variable;

pub use checkpoint::DocumentCheckpoint;
pub use message::{
    AssembledMessage, MessageContent, MultimodalPart, Role, ToolCallRecord, ToolCallStatus,
};
pub use step::{StepFile, StepStatus};
pub use variable::{
    Dependency, EnvValue, EnvVariable, Environment, EnvironmentValues, TriggerMode,
    VariableSource, WorkspaceVariable, LATEST_VERSION,
};

/// Shared cancellation flag for one send loop.
pub type CancelSignal = Arc<AtomicBool>;

/// Creates a fresh, unset cancellation flag.
#[must_use]
pub fn cancel_signal() -> CancelSignal {
    Arc::new(AtomicBool::new(false))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::cancel_signal;

    #[test]
    fn cancel_signal_starts_unset_and_is_shared() {
        let signal = cancel_signal();
        let observer = signal.clone();
        assert!(!observer.load(Ordering::Acquire));

        signal.store(true, Ordering::Release);
        assert!(observer.load(Ordering::Acquire));
    }
}
