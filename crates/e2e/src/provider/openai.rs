//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use mcptest_common::ProviderSettings;
use serde_json::{json, Value};
use tracing::debug;

use super::{check_status, http_client, ChatModel};
use crate::error::{E2eError, E2eResult};
use crate::message::{AssistantTurn, Message, MessagePart, Tool, ToolCall};

/// Stand-in text for images, which `role: tool` messages cannot carry
pub const IMAGE_PLACEHOLDER: &str = "[image omitted]";

pub struct OpenAiModel {
    settings: ProviderSettings,
    client: reqwest::Client,
}

impl OpenAiModel {
    pub fn new(settings: ProviderSettings) -> E2eResult<Self> {
        Ok(Self {
            settings,
            client: http_client()?,
        })
    }

    fn request_body(&self, messages: &[Message], tools: &[Tool]) -> Value {
        let mut body = json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "temperature": 0,
            "messages": to_wire_messages(messages),
        });
        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description.clone().unwrap_or_default(),
                            "parameters": tool.input_schema,
                        }
                    })
                })
                .collect();
        }
        body
    }
}

#[async_trait]
impl ChatModel for OpenAiModel {
    fn describe(&self) -> String {
        format!("openai/{}", self.settings.model)
    }

    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> E2eResult<AssistantTurn> {
        let url = format!("{}/v1/chat/completions", self.settings.base_url());
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&self.request_body(messages, tools))
            .send()
            .await?;

        let body: Value = check_status(response).await?.json().await?;
        debug!(
            "openai finish_reason={} usage={}",
            body["choices"][0]["finish_reason"], body["usage"]
        );
        parse_response(&body)
    }
}

pub fn to_wire_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| match message {
            Message::System(text) => json!({ "role": "system", "content": text }),
            Message::User(text) => json!({ "role": "user", "content": text }),
            Message::Assistant(turn) => {
                let text = crate::message::concat_text(&turn.parts);
                let mut wire = json!({
                    "role": "assistant",
                    "content": if text.is_empty() { Value::Null } else { Value::String(text) },
                });
                if turn.has_tool_calls() {
                    wire["tool_calls"] = turn
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                }
                wire
            }
            Message::Tool(reply) => json!({
                "role": "tool",
                "tool_call_id": reply.call_id,
                "content": tool_reply_text(&reply.parts),
            }),
        })
        .collect()
}

fn tool_reply_text(parts: &[MessagePart]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            MessagePart::Text(text) => Some(text.as_str()),
            MessagePart::Image { .. } => Some(IMAGE_PLACEHOLDER),
            MessagePart::Other(_) => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a chat-completions response body into an assistant turn
pub fn parse_response(body: &Value) -> E2eResult<AssistantTurn> {
    let message = body["choices"]
        .get(0)
        .map(|choice| &choice["message"])
        .filter(|message| message.is_object())
        .ok_or_else(|| E2eError::Provider(format!("response has no choices: {}", body)))?;

    let mut turn = AssistantTurn::default();
    if let Some(text) = message["content"].as_str() {
        turn.parts.push(MessagePart::text(text));
    }

    for call in message["tool_calls"].as_array().into_iter().flatten() {
        let function = &call["function"];
        let name = function["name"]
            .as_str()
            .ok_or_else(|| E2eError::Provider("tool call without function name".to_string()))?;
        let raw = function["arguments"].as_str().unwrap_or("{}");
        let arguments = if raw.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(raw).map_err(|e| {
                E2eError::Provider(format!("invalid arguments for tool {}: {}", name, e))
            })?
        };
        turn.tool_calls.push(ToolCall {
            id: call["id"].as_str().unwrap_or_default().to_string(),
            name: name.to_string(),
            arguments,
        });
    }

    Ok(turn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolReply;

    #[test]
    fn test_tool_reply_images_become_placeholder() {
        let wire = to_wire_messages(&[Message::Tool(ToolReply {
            call_id: "call_1".into(),
            name: "browser_take_screenshot".into(),
            parts: vec![
                MessagePart::text("Took the screenshot"),
                MessagePart::Image { data: "AA==".into(), mime_type: "image/png".into() },
            ],
            is_error: false,
        })]);
        assert_eq!(wire[0]["role"], "tool");
        assert_eq!(wire[0]["tool_call_id"], "call_1");
        assert_eq!(
            wire[0]["content"],
            format!("Took the screenshot\n{}", IMAGE_PLACEHOLDER)
        );
    }

    #[test]
    fn test_assistant_tool_calls_serialize_arguments_as_string() {
        let wire = to_wire_messages(&[Message::Assistant(AssistantTurn {
            parts: vec![],
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "browser_navigate".into(),
                arguments: json!({"url": "https://example.com"}),
            }],
        })]);
        assert!(wire[0]["content"].is_null());
        let args = wire[0]["tool_calls"][0]["function"]["arguments"].as_str().unwrap();
        assert_eq!(serde_json::from_str::<Value>(args).unwrap()["url"], "https://example.com");
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "browser_click", "arguments": "{\"ref\":\"e12\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let turn = parse_response(&body).unwrap();
        assert!(turn.parts.is_empty());
        assert_eq!(turn.tool_calls[0].arguments["ref"], "e12");
    }

    #[test]
    fn test_parse_response_rejects_bad_arguments() {
        let body = json!({
            "choices": [{"message": {"tool_calls": [{
                "id": "c", "function": {"name": "browser_click", "arguments": "{not json"}
            }]}}]
        });
        assert!(matches!(parse_response(&body), Err(E2eError::Provider(_))));
    }

    #[test]
    fn test_parse_response_without_choices() {
        assert!(parse_response(&json!({"choices": []})).is_err());
    }
}
