use std::collections::BTreeMap;
use std::time::Duration;

use crate::retry::{BUSY_POLL_INTERVAL_MS, MAX_BUSY_ATTEMPTS};
use crate::url::DEFAULT_BASE_URL;

/// Transport configuration for automation backend requests.
#[derive(Debug, Clone)]
pub struct StreamApiConfig {
    /// Base URL of the backend, without the `/api` suffix.
    pub base_url: String,
    /// Optional bearer token passed to `Authorization`.
    pub access_token: Option<String>,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional request timeout.
    pub timeout: Option<Duration>,
    /// How many times a `429` chat response is polled before giving up.
    pub busy_retry_limit: u32,
    /// Spacing between `429` polls.
    pub busy_retry_interval: Duration,
}

impl Default for StreamApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
            busy_retry_limit: MAX_BUSY_ATTEMPTS,
            busy_retry_interval: Duration::from_millis(BUSY_POLL_INTERVAL_MS),
        }
    }
}

impl StreamApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_busy_retry(mut self, limit: u32, interval: Duration) -> Self {
        self.busy_retry_limit = limit;
        self.busy_retry_interval = interval;
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}
