//! Completion service abstraction and the OpenAI-compatible client.

pub mod client;

pub use client::InferenceClient;

use crate::tools::ToolDefinition;
use crate::types::{ChatMessage, Completion};
use anyhow::Result;
use async_trait::async_trait;

/// A chat-completion backend that understands tool calling.
///
/// Errors are fatal to the session: without the model there is no way to
/// continue productively.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Send the full history plus the tool catalog; returns the assistant
    /// message, whose `tool_calls` are empty on a final answer.
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolDefinition])
        -> Result<Completion>;

    /// Single-shot completion without tools.
    async fn complete_text(&self, system: &str, user: &str) -> Result<String> {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        let completion = self.complete(&messages, &[]).await?;
        Ok(completion.message.content)
    }
}
