use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use stepwright::{EngineConfig, WorkspaceMode};
use stream_api::{normalize_base_url, StreamApiConfig};
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "STEPWRIGHT_CONFIG_PATH";
pub const BASE_URL_ENV: &str = "STEPWRIGHT_BASE_URL";
pub const ACCESS_TOKEN_ENV: &str = "STEPWRIGHT_ACCESS_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("`automationId` must not be empty")]
    MissingAutomationId,

    #[error("`timeoutSec` must be greater than zero")]
    ZeroTimeout,

    #[error("unknown workspace mode '{0}', expected 'single-file' or 'multi-file'")]
    WorkspaceMode(String),
}

/// On-disk shape of the CLI configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    pub automation_id: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub journal_dir: Option<PathBuf>,
    #[serde(default)]
    pub workspace_mode: Option<String>,
    #[serde(default)]
    pub multi_environment: Option<bool>,
    #[serde(default)]
    pub diff_review: Option<bool>,
    #[serde(default)]
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub engine: EngineConfig,
    pub api: StreamApiConfig,
    /// Root under which checkpoint journals are written; `None` disables them.
    pub journal_dir: Option<PathBuf>,
}

impl CliConfig {
    pub fn from_file_config(file: FileConfig) -> Result<Self, ConfigError> {
        let automation_id = file.automation_id.trim();
        if automation_id.is_empty() {
            return Err(ConfigError::MissingAutomationId);
        }

        let mut engine = EngineConfig::new(automation_id);
        if let Some(model) = file.model.filter(|model| !model.trim().is_empty()) {
            engine = engine.with_model(model);
        }
        if let Some(mode) = file.workspace_mode {
            let parsed =
                WorkspaceMode::parse(&mode).ok_or_else(|| ConfigError::WorkspaceMode(mode))?;
            engine = engine.with_workspace_mode(parsed);
        }
        if let Some(enabled) = file.multi_environment {
            engine = engine.with_multi_environment(enabled);
        }
        if let Some(enabled) = file.diff_review {
            engine = engine.with_diff_review(enabled);
        }

        let mut api = StreamApiConfig::default();
        if let Some(base_url) = file.base_url {
            api = api.with_base_url(normalize_base_url(&base_url));
        }
        if let Some(token) = file.access_token {
            api = api.with_access_token(token);
        }
        match file.timeout_sec {
            Some(0) => return Err(ConfigError::ZeroTimeout),
            Some(seconds) => api = api.with_timeout(Duration::from_secs(seconds)),
            None => {}
        }

        Ok(Self {
            engine,
            api,
            journal_dir: file.journal_dir,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_file_config(file)
    }

    /// Reads the file named by `STEPWRIGHT_CONFIG_PATH` when set, otherwise
    /// starts from defaults for `fallback_automation_id`. Environment
    /// overrides apply last.
    pub fn from_env(fallback_automation_id: &str) -> Result<Self, ConfigError> {
        let config = match env_string_opt(CONFIG_PATH_ENV) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::from_file_config(FileConfig {
                automation_id: fallback_automation_id.to_owned(),
                ..FileConfig::default()
            })?,
        };
        Ok(config.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(base_url) = env_string_opt(BASE_URL_ENV) {
            self.api = self.api.with_base_url(normalize_base_url(&base_url));
        }
        if let Some(token) = env_string_opt(ACCESS_TOKEN_ENV) {
            self.api = self.api.with_access_token(token);
        }
        self.engine = self.engine.with_env_overrides();
        self
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
