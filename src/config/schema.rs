//! Configuration schema for toolwright.toml.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Endpoint used when neither an API key nor a URL is configured.
pub const LOCAL_API_URL: &str = "http://localhost:8080/v1";

/// Root configuration structure.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolwrightConfig {
    /// OpenAI-compatible API base URL, including the version prefix.
    pub api_url: String,

    /// API key sent as a bearer token. Empty means unauthenticated.
    pub api_key: String,

    /// Chat model for the agent loop.
    pub model: String,

    /// Model for output compression. Falls back to `model` when empty.
    pub optimizer_model: String,

    /// Maximum tokens per completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Tool results longer than this many characters are compressed.
    pub optimize_threshold: usize,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub coder: CoderConfig,

    pub mcp: McpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoderConfig {
    /// Programs exposed as `run_cli_<name>` tools when found on PATH.
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct McpConfig {
    pub servers: Vec<McpServerConfig>,
}

/// A stdio MCP server to spawn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}

impl Default for ToolwrightConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            api_key: String::new(),
            model: "gpt-4o".into(),
            optimizer_model: String::new(),
            max_tokens: None,
            temperature: None,
            optimize_threshold: crate::tools::DEFAULT_OPTIMIZE_THRESHOLD,
            log_level: "warn".into(),
            coder: CoderConfig::default(),
            mcp: McpConfig::default(),
        }
    }
}

impl Default for CoderConfig {
    fn default() -> Self {
        Self {
            commands: ["git", "wget", "curl", "docker", "kubectl", "helm", "jq", "yq"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ToolwrightConfig {
    /// Apply `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL` overrides.
    ///
    /// When no key and no URL are set anywhere, the local endpoint is used.
    pub fn apply_env_overrides<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let env_key = non_empty("OPENAI_API_KEY");
        let env_url = non_empty("OPENAI_BASE_URL");

        if let Some(key) = env_key {
            self.api_key = key;
        }
        if let Some(url) = env_url {
            self.api_url = url;
        } else if self.api_key.is_empty() && self.api_url == DEFAULT_API_URL {
            self.api_url = LOCAL_API_URL.into();
        }
        if let Some(model) = non_empty("OPENAI_MODEL") {
            self.model = model;
        }
    }

    pub fn effective_optimizer_model(&self) -> &str {
        if self.optimizer_model.is_empty() {
            &self.model
        } else {
            &self.optimizer_model
        }
    }
}

/// Shows the API key as `***` when set.
impl fmt::Debug for ToolwrightConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolwrightConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("optimizer_model", &self.optimizer_model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("optimize_threshold", &self.optimize_threshold)
            .field("log_level", &self.log_level)
            .field("coder", &self.coder)
            .field("mcp", &self.mcp)
            .finish()
    }
}

pub(crate) fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}
