//! Transport-only client primitives for the automation chat backend.
//!
//! This crate owns request building, response status handling, and decoding of
//! the newline-delimited JSON frame stream. It intentionally contains no message
//! merging, step mutation, or persistence policy; the reconciliation engine
//! consumes these primitives through its own collaborator traits.
//!
//! Frame decoding is best effort: malformed lines degrade to "skip" and never
//! surface as errors, while the likely-incomplete ones get one retry by
//! concatenation with the following line.

pub mod client;
pub mod config;
pub mod error;
pub mod frames;
pub mod headers;
pub mod ndjson;
pub mod payload;
pub mod retry;
pub mod url;

pub use client::{AutomationApiClient, ByteStream, CancellationSignal};
pub use config::StreamApiConfig;
pub use error::StreamApiError;
pub use frames::{DeclaredVariable, DeltaFrame, StreamFrame, ToolCallChunk};
pub use ndjson::FrameDecoder;
pub use payload::{ChatRequest, CommitBody, CommitFile, CommitPayload, CommitReceipt, ImageAttachment};
pub use url::normalize_base_url;
