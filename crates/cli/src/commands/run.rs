//! `mcptest run`: execute a scenario batch and write the report

use std::path::PathBuf;

use clap::Args;
use mcptest_common::{
    FailurePolicy, ProviderKind, ProviderSettings, RunConfig, ScenarioBatch, ToolServerSettings,
};
use mcptest_e2e::TestRunner;
use tracing::info;

use crate::output::{print_run_summary, OutputFormat};

/// Every scenario passed
pub const EXIT_PASSED: i32 = 0;
/// The run completed but at least one scenario failed
pub const EXIT_FAILED: i32 = 1;
/// Configuration, session or aborted-run error
pub const EXIT_FATAL: i32 = 2;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario batch file (`{"scenarios": [...]}`)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Build number, part of the run id
    #[arg(long, env = "BUILD_NUMBER")]
    pub build: u64,

    /// Root directory for run output
    #[arg(long, env = "MCPTEST_OUTPUT_DIR", default_value = mcptest_common::config::DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Language tag for agent feedback (en, ko, ja, ...)
    #[arg(long, env = "MCPTEST_LANGUAGE", default_value = mcptest_common::config::DEFAULT_LANGUAGE)]
    pub language: String,

    /// Model provider: anthropic or openai
    #[arg(long, env = "LLM_PROVIDER")]
    pub provider: String,

    /// Model name
    #[arg(long, env = "LLM_MODEL")]
    pub model: String,

    /// Provider API key
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Provider base URL (defaults to the public API)
    #[arg(long, env = "LLM_BASE_URL")]
    pub base_url: Option<String>,

    /// Max tokens per model response
    #[arg(long, env = "LLM_MAX_TOKENS", default_value_t = mcptest_common::config::DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// Tool server executable
    #[arg(long, env = "MCP_SERVER_COMMAND", default_value = mcptest_common::config::DEFAULT_MCP_COMMAND)]
    pub mcp_command: String,

    /// Tool server arguments, whitespace separated
    #[arg(long, env = "MCP_SERVER_ARGS", default_value = "@playwright/mcp@latest", allow_hyphen_values = true)]
    pub mcp_args: String,

    /// Tool server working directory
    #[arg(long, env = "MCP_SERVER_CWD")]
    pub mcp_cwd: Option<PathBuf>,

    /// Max model turns per scenario
    #[arg(long, env = "MCPTEST_MAX_ITERATIONS", default_value_t = mcptest_common::config::DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,

    /// Record failed scenarios and keep going instead of aborting the run
    #[arg(long)]
    pub continue_on_error: bool,
}

impl RunArgs {
    pub fn to_config(&self) -> mcptest_common::Result<RunConfig> {
        let kind: ProviderKind = self.provider.parse()?;
        let mut provider = ProviderSettings::new(kind, self.model.trim(), self.api_key.trim());
        provider.base_url = self.base_url.clone().filter(|url| !url.trim().is_empty());
        provider.max_tokens = self.max_tokens;

        let mut config = RunConfig::new(self.build, provider);
        config.output_root = self.output_dir.clone();
        config.language = self.language.clone();
        config.tool_server = ToolServerSettings {
            command: self.mcp_command.clone(),
            args: self.mcp_args.split_whitespace().map(str::to_string).collect(),
            cwd: self.mcp_cwd.clone(),
            ..ToolServerSettings::default()
        };
        config.max_iterations = self.max_iterations;
        config.failure_policy = if self.continue_on_error {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        };

        config.validate()?;
        Ok(config)
    }
}

/// Run the batch; returns the process exit code
pub async fn execute(args: RunArgs, format: OutputFormat) -> anyhow::Result<i32> {
    let config = args.to_config()?;
    let batch = ScenarioBatch::from_file(&args.file)?;
    info!(
        "Loaded {} scenario(s) from {}",
        batch.len(),
        args.file.display()
    );

    let runner = TestRunner::new(config)?;
    let report = runner.run(&batch).await?;

    print_run_summary(&report, format);
    Ok(if report.all_passed() {
        EXIT_PASSED
    } else {
        EXIT_FAILED
    })
}
