//! Placeholder detection and the bounded retry policy that follows a rejection.
//!
//! A code update that elides content ("... rest of code unchanged") never reaches
//! a step. Each rejection bumps the step's record; the first
//! [`MAX_AUTO_RETRIES`] rejections schedule an automatic follow-up request, any
//! later one only offers a manual retry. The record disappears on the next
//! update that passes.

use std::collections::HashMap;
use std::sync::OnceLock;

use automation_model::StepFile;
use regex::Regex;

/// Automatic retries allowed per step before a manual retry is required.
pub const MAX_AUTO_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderRule {
    /// `... rest of code unchanged`, `… remaining logic`.
    EllipsisQualifier,
    /// `// existing code unchanged`, `# other functions omitted`.
    UnchangedComment,
    /// `keep the rest as is`.
    KeepRestPhrase,
    /// `// rest of the code`.
    RestOfCodeComment,
}

impl PlaceholderRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EllipsisQualifier => "ellipsis-qualifier",
            Self::UnchangedComment => "unchanged-comment",
            Self::KeepRestPhrase => "keep-rest-phrase",
            Self::RestOfCodeComment => "rest-of-code-comment",
        }
    }
}

fn placeholder_rules() -> &'static [(PlaceholderRule, Regex)] {
    static CACHED: OnceLock<Vec<(PlaceholderRule, Regex)>> = OnceLock::new();
    CACHED.get_or_init(|| {
        [
            (
                PlaceholderRule::EllipsisQualifier,
                r"(?i)(?:\.{3}|…)\s*\(?\s*(?:(?:the\s+)?(?:rest|remaining|remainder|existing|previous|other)\s+(?:of|code|unchanged|logic|implementation|content|lines|steps|file|functions?|methods?)\b|(?:unchanged|omitted|truncated)\b)",
            ),
            (
                PlaceholderRule::UnchangedComment,
                r"(?i)(?://|#|/\*|<!--)[^\n]*\b(?:code|logic|content|implementation|functions?|methods?|rest|remaining|lines?|file|everything)\b[^\n]*\b(?:unchanged|omitted|not\s+shown|remains?\s+the\s+same|stays?\s+the\s+same|as\s+before)\b",
            ),
            (
                PlaceholderRule::KeepRestPhrase,
                r"(?i)\b(?:keep|leave)\s+(?:the\s+)?rest\b[^\n]*\b(?:as\s+is|unchanged|the\s+same|intact)\b",
            ),
            (
                PlaceholderRule::RestOfCodeComment,
                r"(?i)(?://|#|/\*)\s*(?:\.{3}\s*)?(?:the\s+)?rest\s+of\s+(?:the\s+)?(?:code|file|implementation|function|logic)\b",
            ),
        ]
        .into_iter()
        .map(|(rule, pattern)| {
            (
                rule,
                Regex::new(pattern).expect("placeholder regex must compile"),
            )
        })
        .collect()
    })
}

/// Returns the first elision rule `code` trips, if any.
pub fn detect_placeholder(code: &str) -> Option<PlaceholderRule> {
    placeholder_rules()
        .iter()
        .find(|(_, pattern)| pattern.is_match(code))
        .map(|(rule, _)| *rule)
}

pub fn contains_placeholder(code: &str) -> bool {
    detect_placeholder(code).is_some()
}

/// Unresolved placeholder rejections of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionRecord {
    pub count: u32,
    /// The user request that first triggered the rejected update.
    pub last_user_message: String,
    pub step_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Auto { attempt: u32, message: String },
    Manual { message: String },
}

impl RetryDecision {
    pub fn message(&self) -> &str {
        match self {
            Self::Auto { message, .. } | Self::Manual { message } => message,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RetryController {
    records: HashMap<String, RejectionRecord>,
    max_auto_retries: u32,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(MAX_AUTO_RETRIES)
    }
}

impl RetryController {
    pub fn new(max_auto_retries: u32) -> Self {
        Self {
            records: HashMap::new(),
            max_auto_retries,
        }
    }

    /// Counts a rejection for `step` and decides how the retry happens.
    pub fn record_rejection(&mut self, step: &StepFile, user_message: &str) -> RetryDecision {
        let record = self
            .records
            .entry(step.id.clone())
            .or_insert_with(|| RejectionRecord {
                count: 0,
                last_user_message: user_message.to_owned(),
                step_name: step.name.clone(),
            });
        record.count += 1;
        if record.last_user_message.trim().is_empty() {
            record.last_user_message = user_message.to_owned();
        }
        if !step.name.is_empty() {
            record.step_name = step.name.clone();
        }

        let message = compose_retry_message(step, &record.last_user_message);
        if record.count <= self.max_auto_retries {
            RetryDecision::Auto {
                attempt: record.count,
                message,
            }
        } else {
            RetryDecision::Manual { message }
        }
    }

    pub fn clear(&mut self, step_id: &str) -> Option<RejectionRecord> {
        self.records.remove(step_id)
    }

    pub fn record(&self, step_id: &str) -> Option<&RejectionRecord> {
        self.records.get(step_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Message for an explicit retry of `step`, available while a record exists.
    pub fn manual_retry_message(&self, step: &StepFile) -> Option<String> {
        self.records
            .get(&step.id)
            .map(|record| compose_retry_message(step, &record.last_user_message))
    }
}

/// Follow-up request asking the model to resend `step` in full.
pub fn compose_retry_message(step: &StepFile, original_request: &str) -> String {
    let name = if step.name.trim().is_empty() {
        step.id.as_str()
    } else {
        step.name.as_str()
    };

    let mut message = format!(
        "Your previous update to step \"{name}\" was rejected because it contained placeholder \
         text instead of the complete code.\n\n\
         Current code of \"{name}\" ({} lines):\n```\n{}\n```\n",
        step.line_count(),
        step.code
    );
    if !original_request.trim().is_empty() {
        message.push_str(&format!("\nOriginal request: {}\n", original_request.trim()));
    }
    message.push_str(
        "\nReturn the COMPLETE code for this step with every line included. Do not use \
         placeholders such as \"... rest of code unchanged\" or comments claiming code was \
         omitted.",
    );
    message
}
