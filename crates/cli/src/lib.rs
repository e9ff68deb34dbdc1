//! mcptest CLI
//!
//! Command-line front end for the scenario runner and the report server.

pub mod commands;
pub mod output;
