//! Structured verdict extraction from the agent's final message

use mcptest_common::ScenarioResult;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{E2eError, E2eResult};
use crate::message::Message;

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("fence pattern is valid"));

/// Contents of the first ```` ```json ```` fence in `text`
pub fn extract_json_block(text: &str) -> E2eResult<String> {
    JSON_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| E2eError::Extraction("no ```json fence in final message".to_string()))
}

/// Concatenate the message's text parts and extract the fenced block
pub fn extract_from_message(message: &Message) -> E2eResult<String> {
    let text = match message {
        Message::Assistant(turn) => crate::message::concat_text(&turn.parts),
        _ => {
            return Err(E2eError::Extraction(
                "final message is not an assistant turn".to_string(),
            ))
        }
    };
    if text.trim().is_empty() {
        return Err(E2eError::Extraction("final message carries no text".to_string()));
    }
    extract_json_block(&text)
}

/// Validate fenced JSON against the scenario result schema
pub fn parse_result(json: &str) -> E2eResult<ScenarioResult> {
    serde_json::from_str(json).map_err(E2eError::Validation)
}
