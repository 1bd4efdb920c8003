use automation_model::{Dependency, EnvVariable, StepFile};
use serde::{Deserialize, Serialize};

/// Image attached to a chat request; switches the body to multipart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Chat request body for the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub automation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub message: String,
    pub model: String,
    #[serde(default)]
    pub current_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(skip)]
    pub images: Vec<ImageAttachment>,
}

impl ChatRequest {
    pub fn new(
        automation_id: impl Into<String>,
        message: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            automation_id: automation_id.into(),
            step_id: None,
            message: message.into(),
            model: model.into(),
            current_code: String::new(),
            version: None,
            images: Vec::new(),
        }
    }

    pub fn with_step_id(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }

    pub fn with_current_code(mut self, current_code: impl Into<String>) -> Self {
        self.current_code = current_code.into();
        self
    }

    pub fn with_version(mut self, version: Option<u64>) -> Self {
        self.version = version;
        self
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.images.push(image);
        self
    }

    pub fn has_attachments(&self) -> bool {
        !self.images.is_empty()
    }

    /// Text fields of the multipart form, in the same names as the JSON body.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("automationId", self.automation_id.clone()),
            ("message", self.message.clone()),
            ("model", self.model.clone()),
            ("currentCode", self.current_code.clone()),
        ];
        if let Some(step_id) = &self.step_id {
            fields.push(("stepId", step_id.clone()));
        }
        if let Some(version) = self.version {
            fields.push(("version", version.to_string()));
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitFile {
    pub id: String,
    pub name: String,
    pub code: String,
    pub order: usize,
}

impl From<&StepFile> for CommitFile {
    fn from(step: &StepFile) -> Self {
        Self {
            id: step.id.clone(),
            name: step.name.clone(),
            code: step.code.clone(),
            order: step.order,
        }
    }
}

/// Multi-file workspaces commit `files`, single-file ones commit `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommitBody {
    Files(Vec<CommitFile>),
    Code(String),
}

impl CommitBody {
    /// Total code length, used as part of the commit dedupe identity.
    pub fn content_len(&self) -> usize {
        match self {
            Self::Files(files) => files.iter().map(|file| file.code.len()).sum(),
            Self::Code(code) => code.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitPayload {
    pub automation_id: String,
    #[serde(flatten)]
    pub body: CommitBody,
    pub dependencies: Vec<Dependency>,
    pub environment_variables: Vec<EnvVariable>,
    pub change_description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct CommitResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Successful commit acknowledgement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub version: Option<u64>,
}
