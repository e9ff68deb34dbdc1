//! mcptest Common Library
//!
//! Result schema, scenario batch input, persisted per-scenario records and
//! the run configuration object shared by the engine and the CLI.

pub mod config;
pub mod error;
pub mod types;

pub use config::{FailurePolicy, ProviderKind, ProviderSettings, RunConfig, ToolServerSettings};
pub use error::{Error, Result};
pub use types::*;

/// mcptest version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
