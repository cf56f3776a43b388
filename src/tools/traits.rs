//! Tool and provider traits.

use super::{Schema, ToolError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Arguments passed to a tool, already parsed from the model's JSON text.
pub type ToolArgs = serde_json::Map<String, Value>;

/// Definition of a tool exposed to the inference model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Successful tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
}

impl ToolOutput {
    /// Flatten to the plain text the conversation transport carries.
    /// Structured results become compact JSON.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) | Self::Json(Value::String(text)) => text,
            Self::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Ambient context handed to every tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Cancelled when the session is aborted.
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

/// A named, schema-described capability the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used as dispatch key).
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// Schema for the tool's arguments.
    fn schema(&self) -> Schema;

    /// Execute the tool with the given arguments.
    async fn execute(&self, ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema().to_value(),
        }
    }
}

/// A source of tools, enumerated once at session setup.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn tools(&self, ctx: &ToolContext) -> anyhow::Result<Vec<Arc<dyn Tool>>>;
}

/// Fetch a required string argument.
pub fn required_str<'a>(args: &'a ToolArgs, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing '{key}' argument")))
}
