use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version assigned to dependencies introduced without one.
pub const LATEST_VERSION: &str = "latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Test,
    Production,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<String>,
}

impl EnvironmentValues {
    pub fn get(&self, environment: Environment) -> Option<&str> {
        match environment {
            Environment::Dev => self.dev.as_deref(),
            Environment::Test => self.test.as_deref(),
            Environment::Production => self.production.as_deref(),
        }
    }
}

/// Variable value. The shape chosen for a variable is kept for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Scalar(String),
    PerEnvironment(EnvironmentValues),
}

impl Default for EnvValue {
    fn default() -> Self {
        Self::Scalar(String::new())
    }
}

impl EnvValue {
    pub fn is_multi_environment(&self) -> bool {
        matches!(self, Self::PerEnvironment(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(value) => value.is_empty(),
            Self::PerEnvironment(values) => {
                values.dev.is_none() && values.test.is_none() && values.production.is_none()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableSource {
    #[default]
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVariable {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub value: EnvValue,
    #[serde(default)]
    pub source: VariableSource,
}

/// Stored workspace-level variable, used only to backfill new variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceVariable {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default = "latest_version")]
    pub version: String,
}

fn latest_version() -> String {
    LATEST_VERSION.to_owned()
}

impl Dependency {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    #[must_use]
    pub fn latest(name: impl Into<String>) -> Self {
        Self::new(name, LATEST_VERSION)
    }
}

/// Schedule trigger announced by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerMode {
    TimeBased,
    Manual,
}

impl TriggerMode {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "time-based" => Self::TimeBased,
            "manual" => Self::Manual,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeBased => "time-based",
            Self::Manual => "manual",
        }
    }
}
