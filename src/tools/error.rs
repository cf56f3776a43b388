//! Per-call tool failures.
//!
//! Every variant is non-fatal to a session: the agent loop renders the
//! display string as the tool result so the model can react to it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments were missing or had the wrong shape.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The catalog has no operation with the requested name.
    #[error("operation not found: {0}")]
    OperationNotFound(String),
    /// The user declined a mutating call at the confirmation gate.
    #[error("operation cancelled by user")]
    Cancelled,
    /// The call was refused by a safety rule.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// HTTP transport failure, passed through as-is.
    #[error("{0}")]
    Http(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A subprocess failed or exited non-zero.
    #[error("process error: {0}")]
    Process(String),
    /// MCP server failure (transport or tool-level).
    #[error("mcp error: {0}")]
    Mcp(String),
    /// Secondary completion (output optimizer) failed.
    #[error("completion error: {0}")]
    Completion(String),
}
