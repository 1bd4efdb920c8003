use serde_json::error::Category;
use serde_json::Value;
use tracing::{debug, warn};

use crate::frames::{map_frame, StreamFrame};

/// Upper bound for text held while waiting for the rest of a split JSON line.
pub const MAX_INCOMPLETE_BYTES: usize = 10 * 1024;

/// Incremental decoder for newline-delimited JSON frame streams.
///
/// Bytes are buffered until a newline arrives, so chunk boundaries may fall
/// anywhere, including inside a multi-byte UTF-8 sequence.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    residual: Vec<u8>,
    incomplete: String,
}

impl FrameDecoder {
    /// Feed arbitrary bytes into the decoder and drain complete frames.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamFrame> {
        self.residual.extend_from_slice(bytes);
        let mut frames = Vec::new();

        while let Some(split) = self.residual.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.residual.drain(..=split).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            self.process_line(&line, &mut frames);
        }

        frames
    }

    /// Flush the trailing line once the body has ended.
    pub fn finish(&mut self) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        if !self.residual.is_empty() {
            let line = std::mem::take(&mut self.residual);
            let line = String::from_utf8_lossy(&line);
            self.process_line(&line, &mut frames);
        }

        if !self.incomplete.is_empty() {
            debug!(
                bytes = self.incomplete.len(),
                "dropping incomplete frame text at end of stream"
            );
            self.incomplete.clear();
        }

        frames
    }

    /// Decode a complete payload string in one shot.
    pub fn parse_lines(input: &str) -> Vec<StreamFrame> {
        let mut decoder = Self::default();
        let mut frames = decoder.feed(input.as_bytes());
        frames.extend(decoder.finish());
        frames
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.residual.iter().all(u8::is_ascii_whitespace) && self.incomplete.is_empty()
    }

    pub fn pending_incomplete_bytes(&self) -> usize {
        self.incomplete.len()
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<StreamFrame>) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        if !self.incomplete.is_empty() {
            let combined = format!("{}{trimmed}", std::mem::take(&mut self.incomplete));
            match serde_json::from_str::<Value>(&combined) {
                Ok(value) => {
                    push_frames(value, frames);
                    return;
                }
                Err(error) => {
                    debug!(
                        bytes = combined.len(),
                        "dropping incomplete frame text after retry: {error}"
                    );
                }
            }
        }

        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return;
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => push_frames(value, frames),
            Err(error) if is_likely_incomplete(&error, trimmed) => {
                if trimmed.len() <= MAX_INCOMPLETE_BYTES {
                    self.incomplete = trimmed.to_owned();
                } else {
                    debug!(bytes = trimmed.len(), "incomplete frame exceeds buffer cap");
                }
            }
            Err(error) => {
                warn!(line = %truncate_for_log(trimmed), "skipping malformed stream line: {error}");
            }
        }
    }
}

fn push_frames(value: Value, frames: &mut Vec<StreamFrame>) {
    match value {
        Value::Array(items) => frames.extend(items.into_iter().filter_map(map_frame)),
        other => frames.extend(map_frame(other)),
    }
}

/// Needs-more-input check: end-of-input parse error or unbalanced brackets.
pub fn is_likely_incomplete(error: &serde_json::Error, text: &str) -> bool {
    error.classify() == Category::Eof || open_bracket_depth(text) > 0
}

/// Net depth of `{`/`[` left open, ignoring brackets inside string literals.
pub fn open_bracket_depth(text: &str) -> i64 {
    let mut depth = 0_i64;
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => depth -= 1,
            _ => {}
        }
    }

    depth
}

fn truncate_for_log(text: &str) -> &str {
    const LIMIT: usize = 120;
    match text.char_indices().nth(LIMIT) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
