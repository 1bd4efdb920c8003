use serde_json::Value;
use stream_api::StreamApiError;
use thiserror::Error;

/// Why a send did not complete normally.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("request was cancelled")]
    Cancelled,

    #[error("{message}")]
    BadRequest { message: String },

    #[error("{message}")]
    UpgradeRequired { message: String, payload: Value },

    #[error("The server is busy. Please try again later.")]
    ServerBusy,

    #[error("connection failed: {source}")]
    Transport {
        #[source]
        source: StreamApiError,
    },

    #[error("{message}")]
    StreamFailed { message: String },

    #[error("no placeholder retry is pending for step {step_id}")]
    NoRetryPending { step_id: String },

    #[error("unknown step {step_id}")]
    UnknownStep { step_id: String },

    #[error("engine builder is missing {0}")]
    MissingCollaborator(&'static str),

    #[error("engine must be built inside a tokio runtime")]
    NoRuntime,

    #[error("engine has been shut down")]
    ShutDown,
}

impl EngineError {
    /// Set for failures an automatic resend must not repeat.
    pub fn no_auto_retry(&self) -> bool {
        match self {
            Self::Transport { source } => !source.is_retryable(),
            _ => true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Text for the status line; cancellation stays silent.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Cancelled => None,
            other => Some(other.to_string()),
        }
    }
}

impl From<StreamApiError> for EngineError {
    fn from(error: StreamApiError) -> Self {
        match error {
            StreamApiError::Cancelled => Self::Cancelled,
            StreamApiError::BadRequest { message } => Self::BadRequest { message },
            StreamApiError::QuotaExceeded { message, payload } => {
                Self::UpgradeRequired { message, payload }
            }
            StreamApiError::ServerBusy { .. } => Self::ServerBusy,
            StreamApiError::StreamFailed { message } => Self::StreamFailed { message },
            source => Self::Transport { source },
        }
    }
}
