//! First-run interactive setup wizard.
//!
//! Steps:
//! 1. Completion endpoint
//! 2. API key
//! 3. Models
//! 4. Coder commands
//!
//! Existing values are offered as defaults, so the wizard doubles as an
//! editor for an existing config.

use crate::config::{self, ToolwrightConfig, CONFIG_FILE};
use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::path::Path;

const BANNER: &str = r#"
  _              _                  _       _     _
 | |_ ___   ___ | |_      ___ __ _ (_) __ _| |__ | |_
 | __/ _ \ / _ \| \ \ /\ / / '__| || |/ _` | '_ \| __|
 | || (_) | (_) | |\ V  V /| |  | || | (_| | | | | |_
  \__\___/ \___/|_| \_/\_/ |_|  |_|/ |\__, |_| |_|\__|
                                 |__/ |___/
"#;

/// Run the interactive setup wizard and write the config file.
pub fn run_setup_wizard(home: &Path) -> Result<ToolwrightConfig> {
    println!("{}", BANNER);
    println!("Welcome to toolwright setup.\n");

    let config_path = home.join(CONFIG_FILE);
    let existing = config::load_config(&config_path)?;

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let config = configure(&mut reader, existing)?;

    println!("\nWriting configuration...");
    config::save_config(&config, &config_path)?;
    println!("  Written: {}", config_path.display());

    println!("\nSetup complete! Run `toolwright chat` to start.\n");
    Ok(config)
}

/// Collect settings from `reader`, starting from `current`.
pub fn configure(reader: &mut impl BufRead, current: ToolwrightConfig) -> Result<ToolwrightConfig> {
    println!("[1/4] Endpoint");
    let api_url = prompt_with_default(reader, "  API URL", &current.api_url)?;

    println!("\n[2/4] Credentials");
    let api_key = if current.api_key.is_empty() {
        prompt(reader, "  API key (Enter for none)")?
    } else {
        let entered = prompt(reader, "  API key (Enter keeps the current key)")?;
        if entered.is_empty() {
            current.api_key.clone()
        } else {
            entered
        }
    };

    println!("\n[3/4] Models");
    let model = prompt_with_default(reader, "  Chat model", &current.model)?;
    let optimizer_default = current.effective_optimizer_model().to_string();
    let optimizer_model = prompt_with_default(reader, "  Optimizer model", &optimizer_default)?;

    println!("\n[4/4] Coder");
    let commands = prompt_with_default(
        reader,
        "  Command line tools (comma separated)",
        &current.coder.commands.join(","),
    )?;

    let mut config = ToolwrightConfig {
        api_url,
        api_key,
        optimizer_model: if optimizer_model == model {
            String::new()
        } else {
            optimizer_model
        },
        model,
        ..current
    };
    config.coder.commands = commands
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect();

    Ok(config)
}

/// Prompt the user for input with a label.
fn prompt(reader: &mut impl BufRead, label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    reader.read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Prompt with a default value.
fn prompt_with_default(reader: &mut impl BufRead, label: &str, default: &str) -> Result<String> {
    print!("{} [{}]: ", label, default);
    io::stdout().flush()?;
    let mut input = String::new();
    reader.read_line(&mut input)?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(trimmed.to_string())
    }
}
