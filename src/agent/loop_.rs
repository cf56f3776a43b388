//! The tool-calling agent loop.
//!
//! Outer loop: read a prompt, resolve it, render the answer.
//! Inner loop: send history + tools, append the assistant message, run each
//! requested tool in order and append its result, repeat until the model
//! answers without tool calls.

use crate::agent::context::Session;
use crate::agent::input::PromptSource;
use crate::agent::render::{Renderer, SilentRenderer, ToolOutcome};
use crate::llm::CompletionService;
use crate::tools::{ToolArgs, ToolContext, ToolDefinition, ToolSet};
use crate::types::*;
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// The session was aborted through its cancellation token.
#[derive(Debug, Error)]
#[error("session cancelled")]
pub struct Cancelled;

/// A conversation controller over a fixed tool set.
pub struct Agent {
    completion: Arc<dyn CompletionService>,
    tools: ToolSet,
    definitions: Vec<ToolDefinition>,
    renderer: Arc<dyn Renderer>,
    system_prompt: String,
}

impl Agent {
    pub fn new(completion: Arc<dyn CompletionService>, tools: ToolSet) -> Self {
        Self {
            definitions: tools.definitions(),
            completion,
            tools,
            renderer: Arc::new(SilentRenderer),
            system_prompt: String::new(),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// A fresh session seeded with this agent's system prompt.
    pub fn new_session(&self) -> Session {
        Session::new(&self.system_prompt)
    }

    /// Drive a session until the prompt source is exhausted.
    pub async fn run(
        &self,
        session: &mut Session,
        prompts: &mut dyn PromptSource,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let span = info_span!("session", id = %session.id());
        self.drive(session, prompts, cancel).instrument(span).await
    }

    async fn drive(
        &self,
        session: &mut Session,
        prompts: &mut dyn PromptSource,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!("Session {} started with {} tools", session.id(), self.tools.len());

        loop {
            let prompt = tokio::select! {
                _ = cancel.cancelled() => return Err(Cancelled.into()),
                prompt = prompts.next_prompt() => prompt?,
            };
            let Some(prompt) = prompt else {
                break;
            };
            let prompt = prompt.trim();
            if prompt.is_empty() {
                continue;
            }

            let answer = self.answer(session, prompt, cancel).await?;
            self.renderer.answer(&answer);
        }

        info!("Session {} ended ({} messages)", session.id(), session.len());
        Ok(())
    }

    /// Resolve one user prompt and return the final answer.
    ///
    /// On any error the session is rolled back to its state before the
    /// prompt, so history never ends with an unanswered tool call.
    pub async fn ask(
        &self,
        session: &mut Session,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let span = info_span!("session", id = %session.id());
        self.answer(session, prompt, cancel).instrument(span).await
    }

    async fn answer(
        &self,
        session: &mut Session,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let checkpoint = session.checkpoint();
        session.push(ChatMessage::user(prompt));
        let result = self.resolve(session, cancel).await;
        if result.is_err() {
            session.rollback(checkpoint);
        }
        result
    }

    async fn resolve(&self, session: &mut Session, cancel: &CancellationToken) -> Result<String> {
        let ctx = ToolContext::new(cancel.clone());

        let mut round = 0usize;
        loop {
            round += 1;
            debug!("Completion round {} ({} messages)", round, session.len());

            let completion = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Cancelled.into()),
                result = self.completion.complete(session.messages(), &self.definitions) => {
                    result.context("Completion request failed")?
                }
            };

            let message = completion.message;
            let calls = message.tool_calls.clone();
            session.push(message);

            if calls.is_empty() {
                let answer = session
                    .messages()
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                return Ok(answer);
            }

            for call in &calls {
                self.renderer.tool_call(call);
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Cancelled.into()),
                    outcome = dispatch(&self.tools, &ctx, call) => outcome,
                };
                self.renderer.tool_result(call, &outcome);
                session.push(ChatMessage::tool(&call.id, outcome.content));
            }
        }
    }
}

/// Parse the model's argument text. Anything but a JSON object is treated
/// as no arguments.
pub fn parse_arguments(raw: &str) -> ToolArgs {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => {
            if !raw.trim().is_empty() {
                debug!("Ignoring malformed tool arguments: {}", raw);
            }
            ToolArgs::new()
        }
    }
}

/// Execute one tool call. Never fails: every problem becomes the content
/// of a failed outcome.
pub async fn dispatch(tools: &ToolSet, ctx: &ToolContext, call: &ToolCall) -> ToolOutcome {
    let Some(tool) = tools.get(&call.name) else {
        warn!("Model requested unknown tool {}", call.name);
        return ToolOutcome::failure(format!("Unknown tool: {}", call.name));
    };

    info!("Tool {} ({} bytes of arguments)", call.name, call.arguments.len());

    match tool.execute(ctx, parse_arguments(&call.arguments)).await {
        Ok(output) => ToolOutcome::success(output.into_text()),
        Err(e) => {
            warn!("Tool {} [{}] failed: {}", call.name, call.id, e);
            ToolOutcome::failure(e.to_string())
        }
    }
}
