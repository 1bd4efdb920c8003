use std::collections::BTreeMap;

use crate::config::StreamApiConfig;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_USER_AGENT: &str = "user-agent";

pub const ACCEPT_NDJSON: &str = "application/x-ndjson";
pub const ACCEPT_JSON: &str = "application/json";

/// Build a deterministic header map for backend requests.
///
/// Content type is left to the request body encoder so JSON and multipart
/// bodies each carry their own.
pub fn build_headers(config: &StreamApiConfig, accept: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    if let Some(token) = config
        .access_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        headers.insert(HEADER_AUTHORIZATION.to_owned(), format!("Bearer {token}"));
    }

    headers.insert(HEADER_ACCEPT.to_owned(), accept.to_owned());

    let ua = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(default_user_agent);
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    headers
}

pub fn default_user_agent() -> String {
    format!("stepwright/{}", env!("CARGO_PKG_VERSION"))
}
