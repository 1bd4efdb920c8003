use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentStoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line} is not a valid journal line: {source}")]
    Decode {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode journal line for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The file parsed but breaks a journal rule.
    #[error("{path}:{line}: {problem}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        problem: JournalProblem,
    },

    #[error("checkpoint for automation '{found}' does not belong to journal of '{expected}' in {path}")]
    AutomationMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("no journal for automation '{automation_id}' found under {root}")]
    NoJournalFound {
        root: PathBuf,
        automation_id: String,
    },

    #[error("failed to format the current time: {0}")]
    Clock(#[source] time::error::Format),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalProblem {
    #[error("journal header is missing")]
    MissingHeader,
    #[error("expected a journal header record")]
    HeaderExpected,
    #[error("unsupported journal version {0}; expected 1")]
    UnsupportedVersion(u32),
    #[error("automation id is empty")]
    EmptyAutomationId,
    #[error("expected a checkpoint record")]
    CheckpointExpected,
    #[error("duplicate checkpoint id '{0}'")]
    DuplicateId(String),
    #[error("sequence {found} does not follow {previous}")]
    NonIncreasingSequence { previous: u64, found: u64 },
    #[error("field '{field}' is not an RFC 3339 timestamp: {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

impl DocumentStoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn corrupt(path: impl Into<PathBuf>, line: usize, problem: JournalProblem) -> Self {
        Self::Corrupt {
            path: path.into(),
            line,
            problem,
        }
    }

    /// The journal rule a corrupt file broke, if that is what went wrong.
    pub fn problem(&self) -> Option<&JournalProblem> {
        match self {
            Self::Corrupt { problem, .. } => Some(problem),
            _ => None,
        }
    }
}
