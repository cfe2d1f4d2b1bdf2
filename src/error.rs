//! Error types for the market analyst agent

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Core Loop Errors
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The model named a tool the registry does not know.
    UnknownTool,
    /// The tool is registered but its remote handle never resolved.
    Unavailable,
    /// The remote call itself failed.
    Execution,
}

/// A single tool call that produced no result.
#[derive(Error, Debug, Clone)]
#[error("{tool_name} failed ({kind:?}): {description}")]
pub struct DispatchFailure {
    pub tool_name: String,
    pub kind: FailureKind,
    pub description: String,
}
