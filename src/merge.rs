use std::collections::{HashMap, HashSet};

use automation_model::{AssembledMessage, Role, ToolCallRecord, ToolCallStatus};
use stream_api::{DeltaFrame, ToolCallChunk};

/// Ordered message list assembled from stream deltas.
///
/// Messages are addressed through an `id -> position` index, so a delta for any
/// known message merges in place regardless of which message is currently last.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<AssembledMessage>,
    index: HashMap<String, usize>,
    // message id -> (chunk index -> tool call position)
    tool_slots: HashMap<String, HashMap<usize, usize>>,
}

impl MessageLog {
    pub fn from_messages(messages: Vec<AssembledMessage>) -> Self {
        let mut log = Self::default();
        for message in messages {
            log.push(message);
        }
        log
    }

    /// Merges one delta and returns the position of the affected message.
    pub fn merge(&mut self, delta: DeltaFrame) -> usize {
        let position = match self.index.get(&delta.id) {
            Some(position) => *position,
            None => {
                let mut message = AssembledMessage::new(delta.id.clone(), delta.role);
                message.tool_call_id = delta.tool_call_id.clone();
                self.append(message)
            }
        };

        let slots = self.tool_slots.entry(delta.id).or_default();
        let message = &mut self.messages[position];
        if let Some(content) = delta.content {
            message.content.extend(content);
        }
        if message.tool_call_id.is_none() {
            message.tool_call_id = delta.tool_call_id;
        }
        for chunk in delta.tool_call_chunks {
            merge_tool_chunk(&mut message.tool_calls, slots, chunk);
        }

        position
    }

    /// Inserts a locally composed message, replacing any message with the same id.
    pub fn push(&mut self, message: AssembledMessage) -> usize {
        match self.index.get(&message.id) {
            Some(position) => {
                let position = *position;
                self.tool_slots.remove(&message.id);
                self.messages[position] = message;
                position
            }
            None => self.append(message),
        }
    }

    fn append(&mut self, message: AssembledMessage) -> usize {
        if let Some(tail) = self.messages.last_mut() {
            tail.complete = true;
        }
        let position = self.messages.len();
        self.index.insert(message.id.clone(), position);
        self.messages.push(message);
        position
    }

    pub fn messages(&self) -> &[AssembledMessage] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&AssembledMessage> {
        self.index.get(id).map(|position| &self.messages[*position])
    }

    pub fn at(&self, position: usize) -> Option<&AssembledMessage> {
        self.messages.get(position)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Plain copies of every message, in order.
    pub fn to_records(&self) -> Vec<AssembledMessage> {
        self.messages.clone()
    }

    /// Takes every message out of the log, leaving it empty.
    pub fn drain(&mut self) -> Vec<AssembledMessage> {
        self.index.clear();
        self.tool_slots.clear();
        std::mem::take(&mut self.messages)
    }

    pub fn seal_all(&mut self) {
        for message in &mut self.messages {
            message.complete = true;
        }
    }

    pub fn set_step_name(&mut self, id: &str, step_name: &str) -> bool {
        let Some(position) = self.index.get(id) else {
            return false;
        };
        let message = &mut self.messages[*position];
        if message.step_name.as_deref() == Some(step_name) {
            return false;
        }
        message.step_name = Some(step_name.to_owned());
        true
    }

    /// Flips pending tool calls to done when a tool response for them exists in
    /// this log or in `committed` history. Calls on either side can flip, so a
    /// response in this turn completes a call made in an earlier one. Returns
    /// how many calls flipped.
    pub fn mark_completed_tool_calls(&mut self, committed: &mut [AssembledMessage]) -> usize {
        let answered: HashSet<String> = self
            .messages
            .iter()
            .chain(committed.iter())
            .filter(|message| message.role == Role::Tool)
            .filter_map(|message| message.tool_call_id.clone())
            .collect();
        if answered.is_empty() {
            return 0;
        }

        let mut flipped = 0;
        for call in committed
            .iter_mut()
            .chain(self.messages.iter_mut())
            .flat_map(|message| message.tool_calls.iter_mut())
        {
            if call.status == ToolCallStatus::Pending && answered.contains(&call.id) {
                call.status = ToolCallStatus::Done;
                flipped += 1;
            }
        }
        flipped
    }
}

fn merge_tool_chunk(
    calls: &mut Vec<ToolCallRecord>,
    slots: &mut HashMap<usize, usize>,
    chunk: ToolCallChunk,
) {
    let existing = chunk
        .index
        .and_then(|index| slots.get(&index).copied())
        .or_else(|| {
            chunk
                .id
                .as_deref()
                .filter(|id| !id.is_empty())
                .and_then(|id| calls.iter().position(|call| call.id == id))
        });

    match existing {
        Some(position) => {
            let call = &mut calls[position];
            if call.id.is_empty() {
                if let Some(id) = chunk.id {
                    call.id = id;
                }
            }
            if call.name.is_empty() {
                if let Some(name) = chunk.name {
                    call.name = name;
                }
            }
            if let Some(args) = chunk.args {
                call.args.push_str(&args);
            }
        }
        None => {
            calls.push(ToolCallRecord::new(
                chunk.id.unwrap_or_default(),
                chunk.name.unwrap_or_default(),
                chunk.args.unwrap_or_default(),
            ));
            if let Some(index) = chunk.index {
                slots.insert(index, calls.len() - 1);
            }
        }
    }
}
