//! mcptest CLI - Main Entry Point
//!
//! Runs LLM-driven web test scenarios against a browser-automation tool
//! server and serves the resulting reports.

use clap::{Parser, Subcommand};
use tracing::error;

use mcptest_cli::commands::{run, serve};
use mcptest_cli::output::{self, print_error};

/// mcptest - natural-language web scenario testing over MCP
#[derive(Parser)]
#[command(name = "mcptest")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a scenario batch and write the HTML report
    Run(run::RunArgs),

    /// Serve run reports and screenshots over HTTP
    Serve(serve::ServeArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(args) => match run::execute(args, cli.format).await {
            Ok(code) => std::process::exit(code),
            Err(e) => {
                error!("{:#}", e);
                print_error(&format!("Run aborted: {:#}", e));
                std::process::exit(run::EXIT_FATAL);
            }
        },
        Commands::Serve(args) => serve::execute(args).await?,
        Commands::Version => {
            println!("mcptest v{}", mcptest_common::VERSION);
            println!("MCP protocol: {}", mcptest_e2e::mcp::PROTOCOL_VERSION);
        }
    }

    Ok(())
}
