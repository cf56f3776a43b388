//! Output of answers and tool activity.

use crate::types::ToolCall;
use colored::Colorize;

/// Result of one tool dispatch, as fed back to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Displays what the agent loop does.
pub trait Renderer: Send + Sync {
    /// A turn's final answer.
    fn answer(&self, text: &str);

    fn tool_call(&self, _call: &ToolCall) {}

    fn tool_result(&self, _call: &ToolCall, _outcome: &ToolOutcome) {}
}

/// Prints answers to stdout; tool activity only when verbose.
#[derive(Debug, Clone, Default)]
pub struct ConsoleRenderer {
    verbose: bool,
}

impl ConsoleRenderer {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

const PREVIEW_CHARS: usize = 200;

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

impl Renderer for ConsoleRenderer {
    fn answer(&self, text: &str) {
        println!("{}", text.trim());
        println!();
    }

    fn tool_call(&self, call: &ToolCall) {
        if self.verbose {
            eprintln!("{}", format!("> {}({})", call.name, preview(&call.arguments)).dimmed());
        }
    }

    fn tool_result(&self, call: &ToolCall, outcome: &ToolOutcome) {
        if !self.verbose {
            return;
        }
        if outcome.is_error {
            eprintln!(
                "{} {}",
                format!("x {} [{}]:", call.name, call.id).red().bold(),
                outcome.content.red()
            );
        } else {
            eprintln!("{}", format!("< {}", preview(&outcome.content)).dimmed());
        }
    }
}

/// Renders nothing. Used for nested sessions and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentRenderer;

impl Renderer for SilentRenderer {
    fn answer(&self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "ä".repeat(PREVIEW_CHARS + 5);
        let shown = preview(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
