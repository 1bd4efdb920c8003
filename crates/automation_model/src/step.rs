use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Created by the model, no accepted code yet.
    #[default]
    Pending,
    Ready,
}

/// One independently addressable file of the multi-file workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default)]
    pub order: usize,
    #[serde(default)]
    pub environment_variables_used: Vec<String>,
}

impl StepFile {
    #[must_use]
    pub fn pending(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: String::new(),
            status: StepStatus::Pending,
            order: 0,
            environment_variables_used: Vec::new(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.code.lines().count()
    }

    pub fn uses_variable(&self, name: &str) -> bool {
        self.environment_variables_used
            .iter()
            .any(|used| used == name)
    }
}
