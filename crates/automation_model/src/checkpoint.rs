use serde::{Deserialize, Serialize};

use crate::message::AssembledMessage;
use crate::step::StepFile;
use crate::variable::{Dependency, EnvVariable, TriggerMode};

/// Document state handed to persistence after every accepted mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCheckpoint {
    pub automation_id: String,
    #[serde(default)]
    pub messages: Vec<AssembledMessage>,
    #[serde(default)]
    pub steps: Vec<StepFile>,
    #[serde(default)]
    pub environment_variables: Vec<EnvVariable>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_mode: Option<TriggerMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}
