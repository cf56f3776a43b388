//! Conversation state for one agent session.

use crate::types::*;
use tracing::debug;
use ulid::Ulid;

/// The message history of a session, owned by the agent loop.
///
/// History is append-only except for [`Session::rollback`], which the loop
/// uses to drop a partially resolved exchange.
#[derive(Debug, Clone)]
pub struct Session {
    id: Ulid,
    messages: Vec<ChatMessage>,
}

impl Session {
    /// Start a session, seeded with `system_prompt` when it is non-empty.
    pub fn new(system_prompt: &str) -> Self {
        let mut messages = Vec::new();
        if !system_prompt.trim().is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        Self {
            id: Ulid::new(),
            messages,
        }
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Marker for a later [`Session::rollback`].
    pub fn checkpoint(&self) -> usize {
        self.messages.len()
    }

    pub fn rollback(&mut self, checkpoint: usize) {
        if checkpoint < self.messages.len() {
            debug!(
                "Rolling back {} messages",
                self.messages.len() - checkpoint
            );
            self.messages.truncate(checkpoint);
        }
    }
}

const ANALYZE_PROMPT: &str = "Analyze the following input\n\
Explain your findings\n\
Give recommendations based on your observations\n\
If you see problems or errors, propose solutions";

/// Build the one-shot prompt from CLI arguments and piped stdin.
///
/// Stdin alone triggers the analyze prompt; with arguments it is appended.
/// Returns `None` when there is nothing to ask.
pub fn compose_prompt(args: &[String], stdin: Option<&str>) -> Option<String> {
    let prompt = args.join(" ");
    let prompt = prompt.trim();
    let input = stdin.map(str::trim).filter(|s| !s.is_empty());

    match (prompt.is_empty(), input) {
        (true, None) => None,
        (true, Some(input)) => Some(format!("{ANALYZE_PROMPT}\n\nInput:\n{input}")),
        (false, None) => Some(prompt.to_string()),
        (false, Some(input)) => Some(format!("{prompt}\n\n{input}")),
    }
}
