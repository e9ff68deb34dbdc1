//! Run configuration
//!
//! A [`RunConfig`] is built once by the binary (from flags and environment)
//! and handed to the test runner. Nothing here reads process state on its own.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default output root for run directories
pub const DEFAULT_OUTPUT_DIR: &str = "./results";

/// Default response language tag
pub const DEFAULT_LANGUAGE: &str = "en";

/// Default tool server launcher
pub const DEFAULT_MCP_COMMAND: &str = "npx";

/// Default tool server arguments
pub const DEFAULT_MCP_ARGS: &[&str] = &["@playwright/mcp@latest"];

/// Default cap on model turns per scenario
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// Default cap on tokens per model response
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Supported language-model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::OpenAi => "https://api.openai.com",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(ProviderKind::Anthropic),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(Error::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

/// Language-model provider settings
#[derive(Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: String,
    /// Overrides [`ProviderKind::default_base_url`]
    pub base_url: Option<String>,
    pub max_tokens: u32,
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            api_key: api_key.into(),
            base_url: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
            .trim_end_matches('/')
    }
}

// Keeps the API key out of logs.
impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// How to launch the browser-automation tool server
#[derive(Debug, Clone)]
pub struct ToolServerSettings {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
}

impl Default for ToolServerSettings {
    fn default() -> Self {
        Self {
            command: DEFAULT_MCP_COMMAND.to_string(),
            args: DEFAULT_MCP_ARGS.iter().map(|s| s.to_string()).collect(),
            cwd: None,
            env: HashMap::new(),
        }
    }
}

/// What to do when one scenario's pipeline errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the batch, propagate the error, write no report
    #[default]
    Abort,
    /// Record a failed result for the scenario and continue
    Continue,
}

/// Everything the test runner needs for one batch
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub build: u64,
    pub output_root: PathBuf,
    pub language: String,
    pub provider: ProviderSettings,
    pub tool_server: ToolServerSettings,
    pub max_iterations: usize,
    pub failure_policy: FailurePolicy,
}

impl RunConfig {
    pub fn new(build: u64, provider: ProviderSettings) -> Self {
        Self {
            build,
            output_root: PathBuf::from(DEFAULT_OUTPUT_DIR),
            language: DEFAULT_LANGUAGE.to_string(),
            provider,
            tool_server: ToolServerSettings::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Reject settings that would fail only after the tool server is up
    pub fn validate(&self) -> Result<()> {
        if self.provider.model.trim().is_empty() {
            return Err(Error::InvalidConfig("model name is empty".to_string()));
        }
        if self.provider.api_key.trim().is_empty() {
            return Err(Error::InvalidConfig("API key is empty".to_string()));
        }
        if self.provider.max_tokens == 0 {
            return Err(Error::InvalidConfig("max_tokens must be positive".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig("max_iterations must be positive".to_string()));
        }
        if self.tool_server.command.trim().is_empty() {
            return Err(Error::InvalidConfig("tool server command is empty".to_string()));
        }
        Ok(())
    }
}
