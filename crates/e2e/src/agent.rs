//! Bounded model/tool conversation for one scenario

use tracing::{debug, trace};

use crate::error::{E2eError, E2eResult};
use crate::mcp::ToolHost;
use crate::message::{Message, ToolReply};
use crate::provider::ChatModel;

/// A model bound to a tool catalogue for the length of one scenario.
///
/// Agents hold no state between invocations; the run orchestrator builds a
/// fresh one per scenario.
pub struct Agent<'a> {
    model: &'a dyn ChatModel,
    host: &'a dyn ToolHost,
    max_iterations: usize,
}

impl<'a> Agent<'a> {
    pub fn new(model: &'a dyn ChatModel, host: &'a dyn ToolHost, max_iterations: usize) -> Self {
        Self {
            model,
            host,
            max_iterations,
        }
    }

    /// Drive the conversation until the model answers without tool calls.
    ///
    /// Returns every message exchanged, in order, starting with the system
    /// directive and the instruction. The last element is the final
    /// assistant turn.
    pub async fn invoke(&self, system: &str, instruction: &str) -> E2eResult<Vec<Message>> {
        let mut transcript = vec![
            Message::System(system.to_string()),
            Message::User(instruction.to_string()),
        ];

        for iteration in 1..=self.max_iterations {
            let turn = self.model.complete(&transcript, self.host.tools()).await?;
            debug!(
                "{} turn {}: {} tool call(s)",
                self.model.describe(),
                iteration,
                turn.tool_calls.len()
            );

            let calls = turn.tool_calls.clone();
            transcript.push(Message::Assistant(turn));
            if calls.is_empty() {
                return Ok(transcript);
            }

            for call in calls {
                trace!("calling {} with {}", call.name, call.arguments);
                let output = self.host.call_tool(&call.name, call.arguments).await?;
                transcript.push(Message::Tool(ToolReply {
                    call_id: call.id,
                    name: call.name,
                    parts: output.parts,
                    is_error: output.is_error,
                }));
            }
        }

        Err(E2eError::IterationLimit(self.max_iterations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AssistantTurn, MessagePart, Tool, ToolCall, ToolOutput};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct Scripted {
        turns: Mutex<Vec<AssistantTurn>>,
    }

    #[async_trait]
    impl ChatModel for Scripted {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        async fn complete(&self, _messages: &[Message], _tools: &[Tool]) -> E2eResult<AssistantTurn> {
            let mut turns = self.turns.lock().unwrap();
            if turns.is_empty() {
                Ok(calling("browser_snapshot"))
            } else {
                Ok(turns.remove(0))
            }
        }
    }

    struct Echo {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ToolHost for Echo {
        fn tools(&self) -> &[Tool] {
            &[]
        }

        async fn call_tool(&self, name: &str, _arguments: Value) -> E2eResult<ToolOutput> {
            self.calls.lock().unwrap().push(name.to_string());
            Ok(ToolOutput {
                parts: vec![MessagePart::text(format!("{name} done"))],
                is_error: false,
            })
        }
    }

    fn calling(name: &str) -> AssistantTurn {
        AssistantTurn {
            parts: vec![],
            tool_calls: vec![ToolCall {
                id: format!("id-{name}"),
                name: name.to_string(),
                arguments: json!({}),
            }],
        }
    }

    fn answer(text: &str) -> AssistantTurn {
        AssistantTurn {
            parts: vec![MessagePart::text(text)],
            tool_calls: vec![],
        }
    }

    #[tokio::test]
    async fn test_tool_calls_run_in_order_until_answer() {
        let mut both = calling("browser_navigate");
        both.tool_calls.extend(calling("browser_click").tool_calls);
        let model = Scripted {
            turns: Mutex::new(vec![both, calling("browser_take_screenshot"), answer("done")]),
        };
        let host = Echo { calls: Mutex::new(vec![]) };

        let transcript = Agent::new(&model, &host, 10).invoke("sys", "1. go").await.unwrap();

        assert_eq!(
            *host.calls.lock().unwrap(),
            vec!["browser_navigate", "browser_click", "browser_take_screenshot"]
        );
        // system, user, assistant, 2 tools, assistant, tool, assistant
        assert_eq!(transcript.len(), 8);
        assert_eq!(transcript.last().unwrap().text(), "done");
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let model = Scripted { turns: Mutex::new(vec![]) };
        let host = Echo { calls: Mutex::new(vec![]) };

        let err = Agent::new(&model, &host, 3).invoke("sys", "1. go").await.unwrap_err();

        assert!(matches!(err, E2eError::IterationLimit(3)));
        assert_eq!(host.calls.lock().unwrap().len(), 3);
    }
}
