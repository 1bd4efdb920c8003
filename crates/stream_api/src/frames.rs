use automation_model::{MessageContent, Role, TriggerMode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Incremental fragment of one tool call inside a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Argument text fragment; only valid JSON once all fragments are joined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
}

/// Partial update to one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaFrame {
    pub id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_call_chunks: Vec<ToolCallChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DeltaFrame {
    #[must_use]
    pub fn text(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: Some(MessageContent::Text(content.into())),
            tool_call_chunks: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Complete tool response message carrying `content` for `tool_call_id`.
    #[must_use]
    pub fn tool_response(
        id: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::text(id, Role::Tool, content)
        }
    }
}

/// Variable announced by a `used-environment-variables` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredVariable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// One decoded unit of the chat stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Ping,
    Error { message: String },
    ScheduleUpdate { mode: TriggerMode },
    UsedVariables { variables: Vec<DeclaredVariable> },
    Delta(DeltaFrame),
}

impl StreamFrame {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

const DEFAULT_ERROR_MESSAGE: &str = "The assistant stream reported an error";

/// Maps one parsed JSON value to a frame. Unrecognized shapes yield `None`.
pub fn map_frame(value: Value) -> Option<StreamFrame> {
    if value.get("ping").is_some() {
        return Some(StreamFrame::Ping);
    }

    let frame_type = value.get("type").and_then(Value::as_str)?;
    let data = value.get("data");

    match frame_type {
        "error" => {
            let message = data
                .and_then(|data| {
                    data.get("content")
                        .or_else(|| data.get("message"))
                        .and_then(Value::as_str)
                        .or_else(|| data.as_str())
                })
                .filter(|message| !message.trim().is_empty())
                .unwrap_or(DEFAULT_ERROR_MESSAGE);
            Some(StreamFrame::Error {
                message: message.to_owned(),
            })
        }
        "frequency-set" => {
            let mode = data
                .and_then(|data| data.get("triggerMode"))
                .and_then(Value::as_str)
                .and_then(TriggerMode::parse)?;
            Some(StreamFrame::ScheduleUpdate { mode })
        }
        "used-environment-variables" => {
            let variables = data
                .and_then(Value::as_array)
                .map(|entries| entries.iter().filter_map(map_declared_variable).collect())
                .unwrap_or_default();
            Some(StreamFrame::UsedVariables { variables })
        }
        other => {
            let role = Role::parse(other)?;
            let id = value.get("id").and_then(Value::as_str)?;
            Some(StreamFrame::Delta(map_delta(id, role, data)))
        }
    }
}

fn map_declared_variable(entry: &Value) -> Option<DeclaredVariable> {
    // Bare names are accepted alongside `{name, value}` records.
    if let Some(name) = entry.as_str() {
        return Some(DeclaredVariable {
            name: name.to_owned(),
            value: None,
        });
    }

    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())?;
    let value = entry.get("value").filter(|value| !value.is_null()).cloned();
    Some(DeclaredVariable {
        name: name.to_owned(),
        value,
    })
}

fn map_delta(id: &str, role: Role, data: Option<&Value>) -> DeltaFrame {
    let content = data
        .and_then(|data| data.get("content"))
        .and_then(|content| match content {
            Value::String(text) => Some(MessageContent::Text(text.clone())),
            Value::Array(_) => serde_json::from_value::<MessageContent>(content.clone()).ok(),
            _ => None,
        });

    let mut tool_call_chunks: Vec<ToolCallChunk> = data
        .and_then(|data| data.get("tool_call_chunks"))
        .and_then(Value::as_array)
        .map(|chunks| chunks.iter().map(map_tool_call_chunk).collect())
        .unwrap_or_default();

    if tool_call_chunks.is_empty() {
        tool_call_chunks = data
            .and_then(|data| data.get("tool_calls"))
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .enumerate()
                    .map(|(index, call)| ToolCallChunk {
                        index: Some(index),
                        ..map_tool_call_chunk(call)
                    })
                    .collect()
            })
            .unwrap_or_default();
    }

    let string_field = |field: &str| {
        data.and_then(|data| data.get(field))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
    };

    DeltaFrame {
        id: id.to_owned(),
        role,
        content,
        tool_call_chunks,
        tool_call_id: string_field("tool_call_id"),
        name: string_field("name"),
    }
}

fn map_tool_call_chunk(value: &Value) -> ToolCallChunk {
    let args = value.get("args").and_then(|args| match args {
        Value::String(text) => Some(text.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    });

    ToolCallChunk {
        index: value
            .get("index")
            .and_then(Value::as_u64)
            .and_then(|index| usize::try_from(index).ok()),
        id: value
            .get("id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        name: value
            .get("name")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        args,
    }
}
