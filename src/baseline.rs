use std::collections::HashMap;

use similar::{Algorithm, ChangeTag, TextDiff};

/// Last accepted and live content of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileBaseline {
    pub original: String,
    pub current: String,
    pub in_diff_mode: bool,
}

impl FileBaseline {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            original: content.clone(),
            current: content,
            in_diff_mode: false,
        }
    }

    pub fn has_differences(&self) -> bool {
        self.original != self.current
    }
}

/// Added and removed line counts between a baseline and its live content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
}

impl DiffStats {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

pub fn diff_stats(original: &str, current: &str) -> DiffStats {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(original, current);

    diff.iter_all_changes()
        .fold(DiffStats::default(), |mut stats, change| {
            match change.tag() {
                ChangeTag::Insert => stats.added += 1,
                ChangeTag::Delete => stats.removed += 1,
                ChangeTag::Equal => {}
            }
            stats
        })
}

/// Review baselines keyed by file id.
///
/// `original` only moves on [`BaselineSet::accept`] or [`BaselineSet::track`];
/// edits only touch `current`. A file has pending changes exactly when the two
/// differ.
#[derive(Debug, Clone, Default)]
pub struct BaselineSet {
    files: HashMap<String, FileBaseline>,
}

impl BaselineSet {
    /// Starts tracking `file_id` with `content` as accepted and live content.
    pub fn track(&mut self, file_id: impl Into<String>, content: impl Into<String>) {
        self.files.insert(file_id.into(), FileBaseline::new(content));
    }

    /// Snapshots `last_accepted` as the comparison point, unless the file is
    /// already under review.
    pub fn enter_diff_mode(&mut self, file_id: &str, last_accepted: &str) {
        let baseline = self
            .files
            .entry(file_id.to_owned())
            .or_insert_with(|| FileBaseline::new(last_accepted));
        if !baseline.in_diff_mode {
            baseline.original = last_accepted.to_owned();
            baseline.in_diff_mode = true;
        }
    }

    pub fn record_edit(&mut self, file_id: &str, content: &str) {
        let baseline = self
            .files
            .entry(file_id.to_owned())
            .or_insert_with(|| FileBaseline::new(content));
        baseline.current = content.to_owned();
    }

    /// Promotes live content to the baseline and returns it.
    pub fn accept(&mut self, file_id: &str) -> Option<String> {
        let baseline = self.files.get_mut(file_id)?;
        baseline.original = baseline.current.clone();
        baseline.in_diff_mode = false;
        Some(baseline.current.clone())
    }

    /// Restores the baseline as live content and returns it.
    pub fn reject(&mut self, file_id: &str) -> Option<String> {
        let baseline = self.files.get_mut(file_id)?;
        baseline.current = baseline.original.clone();
        baseline.in_diff_mode = false;
        Some(baseline.original.clone())
    }

    pub fn has_differences(&self, file_id: &str) -> bool {
        self.files
            .get(file_id)
            .is_some_and(FileBaseline::has_differences)
    }

    pub fn any_differences(&self) -> bool {
        self.files.values().any(FileBaseline::has_differences)
    }

    /// Ids of files with pending changes, sorted.
    pub fn pending_files(&self) -> Vec<String> {
        let mut pending: Vec<String> = self
            .files
            .iter()
            .filter(|(_, baseline)| baseline.has_differences())
            .map(|(id, _)| id.clone())
            .collect();
        pending.sort();
        pending
    }

    pub fn get(&self, file_id: &str) -> Option<&FileBaseline> {
        self.files.get(file_id)
    }

    pub fn remove(&mut self, file_id: &str) -> Option<FileBaseline> {
        self.files.remove(file_id)
    }

    pub fn diff_stats(&self, file_id: &str) -> Option<DiffStats> {
        self.files
            .get(file_id)
            .map(|baseline| diff_stats(&baseline.original, &baseline.current))
    }
}
