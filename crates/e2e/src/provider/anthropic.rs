//! Anthropic Messages API client

use async_trait::async_trait;
use mcptest_common::ProviderSettings;
use serde_json::{json, Value};
use tracing::debug;

use super::{check_status, http_client, ChatModel};
use crate::error::{E2eError, E2eResult};
use crate::message::{AssistantTurn, Message, MessagePart, Tool, ToolCall};

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicModel {
    settings: ProviderSettings,
    client: reqwest::Client,
}

impl AnthropicModel {
    pub fn new(settings: ProviderSettings) -> E2eResult<Self> {
        Ok(Self {
            settings,
            client: http_client()?,
        })
    }

    fn request_body(&self, messages: &[Message], tools: &[Tool]) -> Value {
        let (system, messages) = to_wire_messages(messages);
        let mut body = json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "temperature": 0,
            "messages": messages,
        });
        if let Some(system) = system {
            body["system"] = Value::String(system);
        }
        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description.clone().unwrap_or_default(),
                        "input_schema": tool.input_schema,
                    })
                })
                .collect();
        }
        body
    }
}

#[async_trait]
impl ChatModel for AnthropicModel {
    fn describe(&self) -> String {
        format!("anthropic/{}", self.settings.model)
    }

    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> E2eResult<AssistantTurn> {
        let url = format!("{}/v1/messages", self.settings.base_url());
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(messages, tools))
            .send()
            .await?;

        let body: Value = check_status(response).await?.json().await?;
        debug!(
            "anthropic stop_reason={} usage={}",
            body["stop_reason"], body["usage"]
        );
        parse_response(&body)
    }
}

/// System prompt plus Messages-API message list.
///
/// Consecutive tool replies are merged into one user message, since the API
/// expects every `tool_use` block to be answered in the next user turn.
pub fn to_wire_messages(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut system: Option<String> = None;
    let mut wire: Vec<Value> = Vec::new();

    for message in messages {
        match message {
            Message::System(text) => {
                system = Some(match system.take() {
                    Some(existing) => format!("{existing}\n\n{text}"),
                    None => text.clone(),
                });
            }
            Message::User(text) => {
                wire.push(json!({ "role": "user", "content": text }));
            }
            Message::Assistant(turn) => {
                let mut content: Vec<Value> = turn
                    .parts
                    .iter()
                    .filter_map(|part| match part {
                        MessagePart::Text(text) if !text.is_empty() => {
                            Some(json!({ "type": "text", "text": text }))
                        }
                        _ => None,
                    })
                    .collect();
                content.extend(turn.tool_calls.iter().map(|call| {
                    json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    })
                }));
                wire.push(json!({ "role": "assistant", "content": content }));
            }
            Message::Tool(reply) => {
                let block = json!({
                    "type": "tool_result",
                    "tool_use_id": reply.call_id,
                    "content": reply.parts.iter().filter_map(part_to_block).collect::<Vec<_>>(),
                    "is_error": reply.is_error,
                });
                let merged = match wire.last_mut() {
                    Some(last) if is_tool_result_message(last) => {
                        if let Some(blocks) = last["content"].as_array_mut() {
                            blocks.push(block.clone());
                        }
                        true
                    }
                    _ => false,
                };
                if !merged {
                    wire.push(json!({ "role": "user", "content": [block] }));
                }
            }
        }
    }

    (system, wire)
}

fn is_tool_result_message(message: &Value) -> bool {
    message["role"] == "user"
        && message["content"]
            .as_array()
            .and_then(|blocks| blocks.first())
            .map(|block| block["type"] == "tool_result")
            .unwrap_or(false)
}

fn part_to_block(part: &MessagePart) -> Option<Value> {
    match part {
        MessagePart::Text(text) => Some(json!({ "type": "text", "text": text })),
        MessagePart::Image { data, mime_type } => Some(json!({
            "type": "image",
            "source": { "type": "base64", "media_type": mime_type, "data": data },
        })),
        MessagePart::Other(_) => None,
    }
}

/// Parse a Messages-API response body into an assistant turn
pub fn parse_response(body: &Value) -> E2eResult<AssistantTurn> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| E2eError::Provider(format!("response has no content array: {}", body)))?;

    let mut turn = AssistantTurn::default();
    for block in blocks {
        match block["type"].as_str() {
            Some("text") => {
                turn.parts.push(MessagePart::Text(
                    block["text"].as_str().unwrap_or_default().to_string(),
                ));
            }
            Some("tool_use") => {
                let id = block["id"].as_str().unwrap_or_default().to_string();
                let name = block["name"]
                    .as_str()
                    .ok_or_else(|| E2eError::Provider("tool_use block without name".to_string()))?
                    .to_string();
                turn.tool_calls.push(ToolCall {
                    id,
                    name,
                    arguments: block.get("input").cloned().unwrap_or_else(|| json!({})),
                });
            }
            _ => turn.parts.push(MessagePart::Other(block.clone())),
        }
    }
    Ok(turn)
}
