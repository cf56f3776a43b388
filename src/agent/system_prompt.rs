//! System prompts per tool bundle, plus project-local instructions.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

pub const CHAT: &str = "You are a helpful assistant. Answer concisely and accurately. \
Use Markdown only where it helps readability.";

pub const CODER: &str = r#"You are a coding assistant working inside the user's project directory.

You can inspect and change files with the filesystem tools and run the listed command line programs.
- Look before you change: list and read files to understand the project first.
- Keep changes minimal and explain what you changed and why.
- Paths are relative to the project directory.
- Never run destructive commands unless the user explicitly asked for them."#;

pub const API: &str = "You are connected to an API Server defined by your Tools. \
You can interact with it by sending messages. Keep answers short and to the point.";

pub const MCP: &str = "You are an assistant with access to tools provided by external servers. \
Use them when they help answer the user's request and summarize their results briefly.";

/// Candidate instruction files, in lookup order.
const INSTRUCTION_FILES: &[&str] = &[
    ".instructions.md",
    ".instructions.txt",
    "instructions.md",
    "instructions.txt",
    ".prompt.md",
    ".prompt.txt",
    "prompt.md",
    "prompt.txt",
];

/// Read the first instruction file found in `dir`.
pub fn load_instructions(dir: &Path) -> Result<Option<String>> {
    for name in INSTRUCTION_FILES {
        let path = dir.join(name);
        if !path.is_file() {
            continue;
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        debug!("Using instructions from {}", path.display());
        return Ok(Some(text.to_string()));
    }
    Ok(None)
}

/// Append project instructions to a base prompt.
pub fn build_system_prompt(base: &str, instructions: Option<&str>) -> String {
    match instructions {
        Some(extra) if !extra.trim().is_empty() => {
            format!("{}\n\n# Project instructions\n\n{}", base.trim_end(), extra.trim())
        }
        _ => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_empty_instruction_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".instructions.md"), "  \n").unwrap();
        std::fs::write(dir.path().join("prompt.txt"), "Use British spelling.\n").unwrap();

        let found = load_instructions(dir.path()).unwrap();
        assert_eq!(found.as_deref(), Some("Use British spelling."));
    }

    #[test]
    fn no_instructions_keeps_base_prompt() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_instructions(dir.path()).unwrap(), None);
        assert_eq!(build_system_prompt(CHAT, None), CHAT);
        assert!(build_system_prompt(CHAT, Some("Be terse.")).ends_with("# Project instructions\n\nBe terse."));
    }
}
