//! Engine configuration.

use std::env;
use std::time::Duration;

use stream_api::retry::{COMMIT_BASE_DELAY_MS, MAX_COMMIT_RETRIES};

use crate::guard::MAX_AUTO_RETRIES;

pub const DEFAULT_MODEL: &str = "default";
pub const DEFAULT_CHANGE_DESCRIPTION: &str = "AI update";
pub const DEFAULT_AUTO_RETRY_DELAY_MS: u64 = 2000;

/// How the workspace is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkspaceMode {
    /// The whole automation is one code blob.
    SingleFile,
    #[default]
    MultiFile,
}

impl WorkspaceMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "single-file" | "single" => Some(Self::SingleFile),
            "multi-file" | "multi" => Some(Self::MultiFile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Retry `n` waits `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_COMMIT_RETRIES,
            base_delay: Duration::from_millis(COMMIT_BASE_DELAY_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub automation_id: String,
    pub model: String,
    pub workspace_mode: WorkspaceMode,
    pub multi_environment: bool,
    /// Route accepted AI edits through accept/reject review.
    pub diff_review: bool,
    pub auto_retry_delay: Duration,
    pub max_auto_retries: u32,
    pub commit: CommitPolicy,
    pub change_description: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            automation_id: String::new(),
            model: DEFAULT_MODEL.to_owned(),
            workspace_mode: WorkspaceMode::default(),
            multi_environment: false,
            diff_review: true,
            auto_retry_delay: Duration::from_millis(DEFAULT_AUTO_RETRY_DELAY_MS),
            max_auto_retries: MAX_AUTO_RETRIES,
            commit: CommitPolicy::default(),
            change_description: DEFAULT_CHANGE_DESCRIPTION.to_owned(),
        }
    }
}

impl EngineConfig {
    pub fn new(automation_id: impl Into<String>) -> Self {
        Self {
            automation_id: automation_id.into(),
            ..Self::default()
        }
    }

    /// Applies `STEPWRIGHT_MODEL`, `STEPWRIGHT_WORKSPACE_MODE`,
    /// `STEPWRIGHT_MULTI_ENV` and `STEPWRIGHT_DIFF_REVIEW` on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(model) = env_string_opt("STEPWRIGHT_MODEL") {
            self.model = model;
        }
        if let Some(mode) =
            env_string_opt("STEPWRIGHT_WORKSPACE_MODE").and_then(|mode| WorkspaceMode::parse(&mode))
        {
            self.workspace_mode = mode;
        }
        if let Some(flag) = env_flag_opt("STEPWRIGHT_MULTI_ENV") {
            self.multi_environment = flag;
        }
        if let Some(flag) = env_flag_opt("STEPWRIGHT_DIFF_REVIEW") {
            self.diff_review = flag;
        }
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_workspace_mode(mut self, mode: WorkspaceMode) -> Self {
        self.workspace_mode = mode;
        self
    }

    pub fn with_multi_environment(mut self, enabled: bool) -> Self {
        self.multi_environment = enabled;
        self
    }

    pub fn with_diff_review(mut self, enabled: bool) -> Self {
        self.diff_review = enabled;
        self
    }

    pub fn with_auto_retry_delay(mut self, delay: Duration) -> Self {
        self.auto_retry_delay = delay;
        self
    }

    pub fn with_max_auto_retries(mut self, retries: u32) -> Self {
        self.max_auto_retries = retries;
        self
    }

    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit = policy;
        self
    }

    pub fn with_change_description(mut self, description: impl Into<String>) -> Self {
        self.change_description = description.into();
        self
    }
}

fn env_flag_opt(key: &str) -> Option<bool> {
    env_string_opt(key).map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
