use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::retry::{is_transient_error_text, FailureClass, TerminalCategory};

#[derive(Debug, Error)]
pub enum StreamApiError {
    #[error("invalid header {0}")]
    InvalidHeader(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// `400` from the chat endpoint; the message is shown verbatim.
    #[error("{message}")]
    BadRequest { message: String },

    /// `403` from the chat endpoint; the payload goes to the upgrade handler.
    #[error("quota or permission check failed: {message}")]
    QuotaExceeded { message: String, payload: Value },

    #[error("server busy after {attempts} attempts, please try again later")]
    ServerBusy { attempts: u32 },

    #[error("HTTP {status} {message}")]
    Status { status: StatusCode, message: String },

    /// Explicit `{error}` body from the persistence endpoint.
    #[error("commit rejected: {message}")]
    CommitRejected { message: String },

    #[error("stream failed: {message}")]
    StreamFailed { message: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("request was cancelled")]
    Cancelled,
}

impl StreamApiError {
    /// `Status` error for a raw code; codes outside 100..=999 become `500`.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(status.as_u16()),
            Self::Request(error) => error.status().map(|status| status.as_u16()),
            Self::BadRequest { .. } => Some(400),
            Self::QuotaExceeded { .. } => Some(403),
            Self::ServerBusy { .. } => Some(429),
            _ => None,
        }
    }

    /// Network failures, timeouts, `5xx` and `429` are transient.
    pub fn classify(&self) -> FailureClass {
        match self {
            Self::Request(error) => match error.status() {
                Some(status) => FailureClass::from_status(status.as_u16()),
                None if error.is_timeout() || error.is_connect() || error.is_request() => {
                    FailureClass::Retryable
                }
                None if is_transient_error_text(&error.to_string()) => FailureClass::Retryable,
                None => FailureClass::Terminal(TerminalCategory::Generic),
            },
            Self::Status { status, .. } => FailureClass::from_status(status.as_u16()),
            Self::ServerBusy { .. } => FailureClass::Retryable,
            Self::BadRequest { .. } | Self::CommitRejected { .. } => {
                FailureClass::Terminal(TerminalCategory::Generic)
            }
            Self::QuotaExceeded { .. } => FailureClass::Terminal(TerminalCategory::Permission),
            _ => FailureClass::Terminal(TerminalCategory::Generic),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.classify().is_retryable()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: NestedError },
    Flat {
        error: Option<String>,
        message: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct NestedError {
    message: Option<String>,
}

/// Extracts a user-facing message from a JSON or plain-text error body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| match parsed {
            ErrorBody::Nested { error } => error.message,
            ErrorBody::Flat { error, message } => error.or(message),
        })
        .filter(|message| !message.trim().is_empty());

    if let Some(message) = from_json {
        return message;
    }

    if body.trim().is_empty() || body.trim_start().starts_with('{') {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.trim().to_string()
    }
}
