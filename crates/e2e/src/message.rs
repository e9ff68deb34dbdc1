//! Conversation model shared by the agent loop, providers and harvester

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One piece of message content
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePart {
    Text(String),
    /// Base64-encoded binary artifact with its media type
    Image { data: String, mime_type: String },
    /// Content the engine does not interpret (resources, audio, ...)
    Other(Value),
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePart::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One model response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantTurn {
    pub parts: Vec<MessagePart>,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantTurn {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Result of executing one tool call, fed back to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolReply {
    pub call_id: String,
    pub name: String,
    pub parts: Vec<MessagePart>,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    System(String),
    User(String),
    Assistant(AssistantTurn),
    Tool(ToolReply),
}

impl Message {
    /// Concatenation of all text parts
    pub fn text(&self) -> String {
        match self {
            Message::System(text) | Message::User(text) => text.clone(),
            Message::Assistant(turn) => concat_text(&turn.parts),
            Message::Tool(reply) => concat_text(&reply.parts),
        }
    }
}

pub fn concat_text(parts: &[MessagePart]) -> String {
    parts.iter().filter_map(MessagePart::as_text).collect()
}

/// A tool exposed by the tool server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Output of one tool call as reported by the tool server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub parts: Vec<MessagePart>,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            parts: vec![MessagePart::Text(message.into())],
            is_error: true,
        }
    }
}
