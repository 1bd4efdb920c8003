use automation_model::DocumentCheckpoint;
use serde::{Deserialize, Serialize};

pub const JOURNAL_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JournalHeader {
    pub version: u32,
    pub journal_id: String,
    pub automation_id: String,
    pub created_at: String,
}

impl JournalHeader {
    #[must_use]
    pub fn v1(
        journal_id: impl Into<String>,
        automation_id: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            version: JOURNAL_VERSION,
            journal_id: journal_id.into(),
            automation_id: automation_id.into(),
            created_at: created_at.into(),
        }
    }
}

/// One persisted document state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckpointRecord {
    pub id: String,
    pub seq: u64,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub checkpoint: DocumentCheckpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum JsonLine {
    Journal(JournalHeader),
    Checkpoint(CheckpointRecord),
}
