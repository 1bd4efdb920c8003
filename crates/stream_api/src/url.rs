/// Default base URL for backend requests.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Normalize a configured base URL.
///
/// Normalization rules:
/// 1) empty input falls back to [`DEFAULT_BASE_URL`]
/// 2) trailing slashes are dropped
/// 3) a trailing `/api` segment is dropped so endpoints can append it uniformly
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    trimmed
        .strip_suffix("/api")
        .unwrap_or(trimmed)
        .to_string()
}

pub fn chat_endpoint(base_url: &str) -> String {
    format!("{}/api/automations/chat", normalize_base_url(base_url))
}

pub fn commit_endpoint(base_url: &str, automation_id: &str) -> String {
    format!(
        "{}/api/automations/{}/commit",
        normalize_base_url(base_url),
        automation_id.trim()
    )
}

pub fn workspace_variables_endpoint(base_url: &str) -> String {
    format!("{}/api/workspace/variables", normalize_base_url(base_url))
}
