//! Tool abstraction, built-in providers and the dispatch map.

pub mod error;
pub mod fs;
pub mod mcp;
pub mod optimizer;
pub mod schema;
pub mod shell;
pub mod traits;

pub use error::ToolError;
pub use optimizer::{optimize_tools, OptimizedTool, DEFAULT_OPTIMIZE_THRESHOLD};
pub use schema::{ObjectSchema, Schema};
pub use traits::{required_str, Tool, ToolArgs, ToolContext, ToolDefinition, ToolOutput, ToolProvider};

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// The immutable tool catalog of one session.
///
/// Lookup is case-insensitive. A later tool with the same (normalized) name
/// replaces the earlier one in place.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolSet {
    pub fn new(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        let mut set = Self::default();
        for tool in tools {
            set.insert(tool);
        }
        set
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Enumerate every provider once. Any provider failure is fatal.
    pub async fn from_providers(
        providers: &[Arc<dyn ToolProvider>],
        ctx: &ToolContext,
    ) -> Result<Self> {
        let mut set = Self::default();
        for provider in providers {
            let tools = provider
                .tools(ctx)
                .await
                .context("Failed to enumerate tools")?;
            for tool in tools {
                set.insert(tool);
            }
        }
        info!("Tool catalog ready: {} tools", set.len());
        Ok(set)
    }

    fn insert(&mut self, tool: Arc<dyn Tool>) {
        let key = tool.name().to_lowercase();
        match self.index.get(&key) {
            Some(&slot) => {
                warn!("Duplicate tool name '{}', keeping the later one", tool.name());
                self.tools[slot] = tool;
            }
            None => {
                self.index.insert(key, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index
            .get(&name.to_lowercase())
            .map(|&slot| &self.tools[slot])
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn into_tools(self) -> Vec<Arc<dyn Tool>> {
        self.tools
    }
}
