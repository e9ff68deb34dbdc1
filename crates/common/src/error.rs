//! Error types for mcptest

use thiserror::Error;

/// Result type alias using the mcptest common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading inputs, configuration, or persisted records
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid scenario batch {path}: {reason}")]
    InvalidBatch { path: String, reason: String },

    #[error("Unknown model provider: {0}")]
    UnknownProvider(String),
}
