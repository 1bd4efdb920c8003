//! Command-line front end for the stepwright engine.
//!
//! ## Commands
//!
//! - `stepwright replay <capture.ndjson> <message>` feeds a captured stream
//!   through the engine in fixed-size chunks. Commits land in memory.
//! - `stepwright send <message>` talks to the live backend.
//!
//! Pass `--accept` to accept every change left pending for review.
//!
//! ## Configuration
//!
//! Set `STEPWRIGHT_CONFIG_PATH` to a UTF-8 JSON file with this shape:
//!
//! ```json
//! {
//!   "automationId": "auto-123",
//!   "baseUrl": "https://backend.example.com",
//!   "accessToken": "<token>",
//!   "model": "default",
//!   "journalDir": ".",
//!   "workspaceMode": "multi-file",
//!   "multiEnvironment": false,
//!   "diffReview": true,
//!   "timeoutSec": 120
//! }
//! ```
//!
//! Only `automationId` is required and unknown fields are rejected.
//! `STEPWRIGHT_BASE_URL` and `STEPWRIGHT_ACCESS_TOKEN` override the file.
//! When `journalDir` is set, every checkpoint is appended to a journal under
//! it and the next run resumes from the latest one.
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

pub mod commands;
pub mod config;
pub mod journal;
pub mod replay;
pub mod runner;
