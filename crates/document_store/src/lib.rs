//! Append-only JSONL journal of document checkpoints.
//!
//! The first line of every journal is a header naming the automation; each
//! following line is one checkpoint with a strictly increasing sequence number.

mod error;
mod paths;
mod schema;
mod store;

pub use error::{DocumentStoreError, JournalProblem};
pub use paths::{journal_file_name, journal_root};
pub use schema::{CheckpointRecord, JournalHeader, JOURNAL_VERSION};
pub use store::DocumentJournal;
