//! Toolwright: tool-calling agent CLI.
//!
//! Usage:
//!   toolwright [PROMPT...]     One-shot answer, no tools
//!   toolwright chat            Interactive chat
//!   toolwright coder           Filesystem and command line tools
//!   toolwright openapi         Tools from an OpenAPI document
//!   toolwright mcp             Tools from configured MCP servers
//!   toolwright setup           Run the setup wizard
//!   toolwright config          Show the effective config

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use toolwright::agent::system_prompt::{self, build_system_prompt, load_instructions};
use toolwright::agent::{compose_prompt, Agent, Cancelled, ConsoleRenderer, ScriptedPrompts, StdinPrompts};
use toolwright::config::{self, ToolwrightConfig};
use toolwright::llm::{CompletionService, InferenceClient};
use toolwright::openapi::{
    load_document, AutoApprove, Catalog, Confirm, ConfirmGate, ConsoleConfirm, Credentials, RestClient,
};
use toolwright::tools::fs::FileSystem;
use toolwright::tools::mcp::McpProvider;
use toolwright::tools::shell::CommandProvider;
use toolwright::tools::{optimize_tools, ToolContext, ToolProvider, ToolSet};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "toolwright")]
#[command(version)]
#[command(about = "Connect a chat model to APIs, files, commands and MCP servers")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Prompt for a one-shot answer.
    prompt: Vec<String>,

    /// Path to the toolwright home directory (default ~/.toolwright).
    #[arg(long, global = true)]
    home: Option<String>,

    /// Log level (debug, info, warn, error). Defaults to the config value.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Show tool calls and tool errors.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat without tools.
    Chat {
        /// Prompt for a one-shot answer.
        prompt: Vec<String>,
    },

    /// Work on a project with filesystem and command line tools.
    Coder {
        /// Project directory the tools operate in.
        #[arg(long, default_value = ".")]
        path: String,

        /// Compress large tool outputs with the optimizer model.
        #[arg(long)]
        optimize: bool,

        /// Prompt for a one-shot answer.
        prompt: Vec<String>,
    },

    /// Talk to an API described by an OpenAPI document.
    Openapi {
        /// Document path or URL (OpenAPI 3 or Swagger 2, JSON or YAML).
        #[arg(long)]
        file: String,

        /// API base URL. Defaults to the document's first server.
        #[arg(long)]
        url: Option<String>,

        /// Bearer token.
        #[arg(long)]
        bearer: Option<String>,

        /// Basic auth username.
        #[arg(long)]
        username: Option<String>,

        /// Basic auth password.
        #[arg(long)]
        password: Option<String>,

        /// Compress large tool outputs with the optimizer model.
        #[arg(long)]
        optimize: bool,

        /// Run mutating requests without asking.
        #[arg(long)]
        yes: bool,

        /// Prompt for a one-shot answer.
        prompt: Vec<String>,
    },

    /// Use tools from the MCP servers in the config.
    Mcp {
        /// Compress large tool outputs with the optimizer model.
        #[arg(long)]
        optimize: bool,

        /// Prompt for a one-shot answer.
        prompt: Vec<String>,
    },

    /// Run the first-time setup wizard.
    Setup,

    /// Show the effective configuration.
    Config,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let home_dir = match &cli.home {
        Some(home) => PathBuf::from(shellexpand::tilde(home).into_owned()),
        None => config::default_home_dir(),
    };
    let config = config::load_effective(&home_dir)?;

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted");
                cancel.cancel();
            }
        });
    }

    let app = App {
        config,
        verbose: cli.verbose,
        cancel,
    };

    let result = match cli.command {
        None => {
            let Some(prompt) = compose_prompt(&cli.prompt, read_piped_stdin()?.as_deref()) else {
                Cli::command().print_help()?;
                return Ok(());
            };
            app.cmd_chat(Some(prompt)).await
        }
        Some(Commands::Chat { prompt }) => app.cmd_chat(app.prompt(&prompt)?).await,
        Some(Commands::Coder { path, optimize, prompt }) => {
            app.cmd_coder(&path, optimize, app.prompt(&prompt)?).await
        }
        Some(Commands::Openapi {
            file,
            url,
            bearer,
            username,
            password,
            optimize,
            yes,
            prompt,
        }) => {
            let credentials = Credentials::from_options(bearer, username, password);
            let opts = OpenapiOpts {
                file,
                url,
                credentials,
                optimize,
                yes,
            };
            app.cmd_openapi(opts, app.prompt(&prompt)?).await
        }
        Some(Commands::Mcp { optimize, prompt }) => app.cmd_mcp(optimize, app.prompt(&prompt)?).await,
        Some(Commands::Setup) => cmd_setup(&home_dir),
        Some(Commands::Config) => cmd_config(&app.config),
    };

    match result {
        Err(e) if e.downcast_ref::<Cancelled>().is_some() => {
            eprintln!("{}", "Cancelled.".yellow());
            // A blocked terminal read would keep the runtime alive.
            std::process::exit(130);
        }
        other => other,
    }
}

/// Everything a session needs from the command line.
struct App {
    config: ToolwrightConfig,
    verbose: bool,
    cancel: CancellationToken,
}

struct OpenapiOpts {
    file: String,
    url: Option<String>,
    credentials: Credentials,
    optimize: bool,
    yes: bool,
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

impl App {
    async fn cmd_chat(&self, prompt: Option<String>) -> Result<()> {
        let system = project_prompt(system_prompt::CHAT, Path::new("."))?;
        self.run_agent(ToolSet::empty(), system, prompt).await
    }

    async fn cmd_coder(&self, path: &str, optimize: bool, prompt: Option<String>) -> Result<()> {
        let root = PathBuf::from(shellexpand::tilde(path).into_owned());
        let fs = FileSystem::new(&root)?;
        let root = fs.root().to_path_buf();
        println!("{} Working in {}", ">>>".green().bold(), root.display());

        let providers: Vec<Arc<dyn ToolProvider>> = vec![
            Arc::new(fs),
            Arc::new(CommandProvider::new(self.config.coder.commands.clone()).in_dir(&root)),
        ];
        let tools = self.build_tools(&providers, optimize).await?;
        let system = project_prompt(system_prompt::CODER, &root)?;
        self.run_agent(tools, system, prompt).await
    }

    async fn cmd_openapi(&self, opts: OpenapiOpts, prompt: Option<String>) -> Result<()> {
        let document = load_document(&opts.file)
            .await
            .with_context(|| format!("Failed to load OpenAPI document {}", opts.file))?;

        let base_url = match opts.url {
            Some(url) => url,
            None => document
                .servers
                .first()
                .map(|server| server.url.clone())
                .context("The document declares no server; pass --url")?,
        };
        let client = RestClient::new(&base_url)?.with_credentials(opts.credentials);
        let confirm: Arc<dyn Confirm> = if opts.yes {
            Arc::new(AutoApprove)
        } else {
            Arc::new(ConsoleConfirm)
        };
        let gate = ConfirmGate::new(Arc::new(client), confirm);

        let catalog = Catalog::from_document(&document, Arc::new(gate));
        if catalog.is_empty() {
            warn!("No operations with an operationId in {}", opts.file);
        }
        println!(
            "{} {} ({} operations) at {}",
            ">>>".green().bold(),
            catalog.title(),
            catalog.len(),
            base_url
        );

        let providers: Vec<Arc<dyn ToolProvider>> = vec![Arc::new(catalog)];
        let tools = self.build_tools(&providers, opts.optimize).await?;
        let system = project_prompt(system_prompt::API, Path::new("."))?;
        self.run_agent(tools, system, prompt).await
    }

    async fn cmd_mcp(&self, optimize: bool, prompt: Option<String>) -> Result<()> {
        if self.config.mcp.servers.is_empty() {
            anyhow::bail!("No MCP servers configured; add [[mcp.servers]] to toolwright.toml");
        }
        let providers: Vec<Arc<dyn ToolProvider>> =
            vec![Arc::new(McpProvider::new(self.config.mcp.servers.clone()))];
        let tools = self.build_tools(&providers, optimize).await?;
        let system = project_prompt(system_prompt::MCP, Path::new("."))?;
        self.run_agent(tools, system, prompt).await
    }

    fn completion(&self) -> InferenceClient {
        InferenceClient::new(&self.config.api_url, &self.config.api_key, &self.config.model)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
    }

    async fn build_tools(&self, providers: &[Arc<dyn ToolProvider>], optimize: bool) -> Result<ToolSet> {
        let ctx = ToolContext::new(self.cancel.clone());
        let tools = ToolSet::from_providers(providers, &ctx).await?;
        if !optimize {
            return Ok(tools);
        }

        let optimizer: Arc<dyn CompletionService> =
            Arc::new(self.completion().with_model(self.config.effective_optimizer_model()));
        info!(
            "Optimizing outputs over {} characters with {}",
            self.config.optimize_threshold,
            self.config.effective_optimizer_model()
        );
        Ok(ToolSet::new(optimize_tools(
            tools.into_tools(),
            optimizer,
            self.config.optimize_threshold,
        )))
    }

    async fn run_agent(&self, tools: ToolSet, system: String, prompt: Option<String>) -> Result<()> {
        let completion = self.completion();
        info!("Using model {} at {}", completion.model(), self.config.api_url);

        let agent = Agent::new(Arc::new(completion), tools)
            .with_system_prompt(system)
            .with_renderer(Arc::new(ConsoleRenderer::new(self.verbose)));
        let mut session = agent.new_session();

        match prompt {
            Some(prompt) => {
                let mut prompts = ScriptedPrompts::new([prompt]);
                agent.run(&mut session, &mut prompts, &self.cancel).await
            }
            None => {
                if agent.tools().is_empty() {
                    println!("{}", "Type a message, Ctrl-D to quit.".dimmed());
                } else {
                    println!(
                        "{}",
                        format!("{} tools ready. Type a message, Ctrl-D to quit.", agent.tools().len()).dimmed()
                    );
                }
                agent.run(&mut session, &mut StdinPrompts, &self.cancel).await
            }
        }
    }

    /// One-shot prompt from arguments and piped stdin, if any.
    fn prompt(&self, args: &[String]) -> Result<Option<String>> {
        Ok(compose_prompt(args, read_piped_stdin()?.as_deref()))
    }
}

fn cmd_setup(home_dir: &Path) -> Result<()> {
    toolwright::setup::run_setup_wizard(home_dir)?;
    Ok(())
}

fn cmd_config(config: &ToolwrightConfig) -> Result<()> {
    println!("{}", config::render_redacted(config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read stdin to the end when it is not a terminal.
fn read_piped_stdin() -> Result<Option<String>> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut input = String::new();
    stdin
        .lock()
        .read_to_string(&mut input)
        .context("Failed to read stdin")?;
    Ok(Some(input))
}

fn project_prompt(base: &str, dir: &Path) -> Result<String> {
    let instructions = load_instructions(dir)?;
    Ok(build_system_prompt(base, instructions.as_deref()))
}
