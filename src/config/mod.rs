pub mod schema;

pub use schema::{CoderConfig, McpConfig, McpServerConfig, ToolwrightConfig};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "toolwright.toml";

/// Default toolwright home directory (~/.toolwright).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".toolwright"))
        .unwrap_or_else(|| PathBuf::from(".toolwright"))
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<ToolwrightConfig> {
    if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read toolwright config file")?;
        let config: ToolwrightConfig =
            toml::from_str(&contents).context("Failed to parse toolwright config (TOML)")?;
        Ok(config)
    } else {
        Ok(ToolwrightConfig::default())
    }
}

/// Load config from `home` and apply environment overrides.
pub fn load_effective(home: &Path) -> Result<ToolwrightConfig> {
    let path = home.join(CONFIG_FILE);
    let mut config = load_config(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &ToolwrightConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}

/// Render the config as TOML with the API key masked.
pub fn render_redacted(config: &ToolwrightConfig) -> Result<String> {
    let mut shown = config.clone();
    shown.api_key = schema::redact(&config.api_key).to_string();
    toml::to_string_pretty(&shown).context("Failed to serialize config")
}
