//! Error types for scenario execution

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Tool session error: {0}")]
    Session(String),

    #[error("No structured result found: {0}")]
    Extraction(String),

    #[error("Structured result does not match schema: {0}")]
    Validation(#[source] serde_json::Error),

    #[error("Unusable screenshot artifact: {0}")]
    ToolArtifact(String),

    #[error("Agent exceeded {0} model turns without a final answer")]
    IterationLimit(usize),

    #[error("Model provider error: {0}")]
    Provider(String),

    #[error("Scenario {index} ({title}) failed: {source}")]
    ScenarioExecution {
        index: usize,
        title: String,
        /// Screenshots written before the failure
        screenshots: Vec<String>,
        #[source]
        source: Box<E2eError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Common(#[from] mcptest_common::Error),
}

impl E2eError {
    /// Errors that end the whole run regardless of failure policy
    pub fn is_fatal_to_run(&self) -> bool {
        match self {
            E2eError::Configuration(_) | E2eError::Session(_) => true,
            E2eError::Common(mcptest_common::Error::InvalidConfig(_))
            | E2eError::Common(mcptest_common::Error::UnknownProvider(_)) => true,
            E2eError::ScenarioExecution { source, .. } => source.is_fatal_to_run(),
            _ => false,
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
