use std::path::{Path, PathBuf};

pub const JOURNAL_DIR: [&str; 2] = [".stepwright", "journals"];

#[must_use]
pub fn journal_root(root: &Path) -> PathBuf {
    root.join(JOURNAL_DIR[0]).join(JOURNAL_DIR[1])
}

#[must_use]
pub fn sanitize_timestamp_for_filename(timestamp: &str) -> String {
    timestamp
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' | ' ' => '-',
            _ => c,
        })
        .collect()
}

#[must_use]
pub fn journal_file_name(created_at: &str, journal_id: &str) -> String {
    format!(
        "{}_{}.jsonl",
        sanitize_timestamp_for_filename(created_at),
        journal_id
    )
}

#[cfg(test)]
mod tests {
    use super::journal_file_name;

    #[test]
    fn file_name_replaces_colons() {
        assert_eq!(
            journal_file_name("2026-02-14T00:00:00Z", "j1"),
            "2026-02-14T00-00-00Z_j1.jsonl"
        );
    }
}
