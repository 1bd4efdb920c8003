use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of an assembled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
    Tool,
}

impl Role {
    /// Parses wire role names, including chunk-class aliases.
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "human" | "user" | "HumanMessage" | "HumanMessageChunk" => Self::Human,
            "ai" | "assistant" | "AIMessage" | "AIMessageChunk" => Self::Ai,
            "tool" | "ToolMessage" | "ToolMessageChunk" => Self::Tool,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Ai => "ai",
            Self::Tool => "tool",
        }
    }
}

/// One part of a multimodal message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MultimodalPart {
    Text { text: String },
    ImageUrl { image_url: Value },
}

/// Message body: plain text or an ordered list of multimodal parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<MultimodalPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl MessageContent {
    /// Concatenated text of the body; image parts contribute nothing.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text.as_str()),
            Self::Parts(parts) => Cow::Owned(
                parts
                    .iter()
                    .filter_map(|part| match part {
                        MultimodalPart::Text { text } => Some(text.as_str()),
                        MultimodalPart::ImageUrl { .. } => None,
                    })
                    .collect(),
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => parts.is_empty(),
        }
    }

    /// Appends a text fragment, growing the trailing text part when multimodal.
    pub fn push_text(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }

        match self {
            Self::Text(text) => text.push_str(fragment),
            Self::Parts(parts) => match parts.last_mut() {
                Some(MultimodalPart::Text { text }) => text.push_str(fragment),
                _ => parts.push(MultimodalPart::Text {
                    text: fragment.to_owned(),
                }),
            },
        }
    }

    /// Merges a later fragment of the same message into this body.
    pub fn extend(&mut self, fragment: MessageContent) {
        match fragment {
            Self::Text(text) => self.push_text(&text),
            Self::Parts(incoming) => {
                if let Self::Text(existing) = self {
                    let existing = std::mem::take(existing);
                    *self = if existing.is_empty() {
                        Self::Parts(Vec::new())
                    } else {
                        Self::Parts(vec![MultimodalPart::Text { text: existing }])
                    };
                }

                for part in incoming {
                    match part {
                        MultimodalPart::Text { text } => self.push_text(&text),
                        image @ MultimodalPart::ImageUrl { .. } => {
                            if let Self::Parts(parts) = self {
                                parts.push(image);
                            }
                        }
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    #[default]
    Pending,
    Done,
}

/// Tool call requested by an AI message.
///
/// `args` is the raw accumulated argument text. It is only valid JSON once every
/// fragment has arrived, so structured access goes through [`ToolCallRecord::parsed_args`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub args: String,
    #[serde(default)]
    pub status: ToolCallStatus,
}

impl ToolCallRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args: args.into(),
            status: ToolCallStatus::Pending,
        }
    }

    pub fn parsed_args(&self) -> Option<Value> {
        if self.args.trim().is_empty() {
            return None;
        }
        serde_json::from_str(&self.args).ok()
    }

    pub fn is_done(&self) -> bool {
        self.status == ToolCallStatus::Done
    }
}

/// Message reconstructed from stream deltas. Unique by `id` within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledMessage {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Display label of the step this message mutated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(default)]
    pub complete: bool,
}

impl AssembledMessage {
    #[must_use]
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            content: MessageContent::default(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            step_name: None,
            complete: false,
        }
    }

    /// A complete human message, as composed locally before a send.
    #[must_use]
    pub fn human(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            content: MessageContent::Text(text.into()),
            complete: true,
            ..Self::new(id, Role::Human)
        }
    }

    pub fn text(&self) -> Cow<'_, str> {
        self.content.text()
    }
}
