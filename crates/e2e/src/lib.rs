//! mcptest scenario-execution engine
//!
//! Runs natural-language web test scenarios by driving a tool-calling
//! language model against a browser-automation tool server spoken to over
//! MCP stdio, then collects a structured verdict per scenario and renders
//! one HTML report per run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TestRunner (one per batch)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  McpSession (one per run, shared)  ─── ToolHost             │
//! │  ChatModel (Anthropic | OpenAI)                             │
//! │                                                             │
//! │  for each scenario, in order:                               │
//! │    ScenarioExecutor::execute(index, scenario)               │
//! │      ├── build_instruction / system_directive               │
//! │      ├── Agent::invoke -> transcript                        │
//! │      ├── ScreenshotHarvester::harvest -> 1.png, 2.png, ...  │
//! │      ├── extract_from_message + parse_result                │
//! │      └── result.json                                        │
//! │                                                             │
//! │  write_report -> report.html + report.css                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod error;
pub mod extract;
pub mod harvest;
pub mod instruction;
pub mod mcp;
pub mod message;
pub mod provider;
pub mod report;
pub mod runner;
pub mod scenario;

pub use agent::Agent;
pub use error::{E2eError, E2eResult};
pub use mcp::{McpSession, ToolHost};
pub use message::{AssistantTurn, Message, MessagePart, Tool, ToolCall, ToolOutput, ToolReply};
pub use provider::{build_model, ChatModel};
pub use report::{render_report, write_report};
pub use runner::TestRunner;
pub use scenario::ScenarioExecutor;
