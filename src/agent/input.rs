//! Sources of user prompts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Yields user prompts until exhausted.
#[async_trait]
pub trait PromptSource: Send {
    /// `None` ends the session.
    async fn next_prompt(&mut self) -> Result<Option<String>>;
}

/// Interactive prompts read from the terminal.
#[derive(Debug, Default)]
pub struct StdinPrompts;

fn read_prompt() -> io::Result<Option<String>> {
    print!("> ");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        println!();
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

#[async_trait]
impl PromptSource for StdinPrompts {
    async fn next_prompt(&mut self) -> Result<Option<String>> {
        let line = tokio::task::spawn_blocking(read_prompt)
            .await
            .context("Prompt reader task failed")?
            .context("Failed to read prompt")?;
        Ok(line)
    }
}

/// A fixed list of prompts.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompts {
    prompts: VecDeque<String>,
}

impl ScriptedPrompts {
    pub fn new<I, S>(prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prompts: prompts.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl PromptSource for ScriptedPrompts {
    async fn next_prompt(&mut self) -> Result<Option<String>> {
        Ok(self.prompts.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_prompts_drain_in_order() {
        let mut prompts = ScriptedPrompts::new(["a", "b"]);
        assert_eq!(prompts.next_prompt().await.unwrap().as_deref(), Some("a"));
        assert_eq!(prompts.next_prompt().await.unwrap().as_deref(), Some("b"));
        assert_eq!(prompts.next_prompt().await.unwrap(), None);
    }
}
