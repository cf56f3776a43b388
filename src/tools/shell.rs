//! Command-line programs exposed as `run_cli_<name>` tools.

use super::{Schema, Tool, ToolArgs, ToolContext, ToolError, ToolOutput, ToolProvider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

/// Argument sequences that are never passed to a program.
const FORBIDDEN_PATTERNS: &[&str] = &[
    "rm -rf /",
    "push --force",
    "push -f",
    "reset --hard",
    "clean -fdx",
    "system prune",
    "delete namespace",
    "delete --all",
    "uninstall --all",
    "dd if=",
    "mkfs",
];

fn is_forbidden(command_line: &str) -> bool {
    let lower = command_line.to_lowercase();
    FORBIDDEN_PATTERNS.iter().any(|pat| lower.contains(pat))
}

/// Provides one tool per program found on `PATH`. Programs that cannot be
/// located are skipped.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    programs: Vec<String>,
    workdir: Option<PathBuf>,
}

impl CommandProvider {
    pub fn new<I, S>(programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            programs: programs.into_iter().map(Into::into).collect(),
            workdir: None,
        }
    }

    /// Run every program from `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }
}

#[async_trait]
impl ToolProvider for CommandProvider {
    async fn tools(&self, _ctx: &ToolContext) -> Result<Vec<Arc<dyn Tool>>> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        for program in &self.programs {
            match CliTool::locate(program, self.workdir.clone()) {
                Ok(tool) => tools.push(Arc::new(tool)),
                Err(e) => debug!("{:#}, skipping", e),
            }
        }
        info!("{} command line tools available", tools.len());
        Ok(tools)
    }
}

/// Runs a single program with model-supplied arguments.
pub struct CliTool {
    tool_name: String,
    description: String,
    program: PathBuf,
    workdir: Option<PathBuf>,
}

impl CliTool {
    pub fn new(name: &str, program: PathBuf, workdir: Option<PathBuf>) -> Self {
        Self {
            tool_name: format!("run_cli_{name}"),
            description: format!(
                "run the `{name}` command line interface command with the given arguments"
            ),
            program,
            workdir,
        }
    }

    /// Find `name` on `PATH`; fails when the program is not installed.
    pub fn locate(name: &str, workdir: Option<PathBuf>) -> Result<Self> {
        let program = which::which(name).with_context(|| format!("{name} not found on PATH"))?;
        debug!("Found {} at {}", name, program.display());
        Ok(Self::new(name, program, workdir))
    }
}

fn parse_args(args: &ToolArgs) -> Result<Vec<String>, ToolError> {
    match args.get("args") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(ToolError::InvalidArguments(format!(
                    "args must be strings, got {other}"
                ))),
            })
            .collect(),
        Some(_) => Err(ToolError::InvalidArguments("args must be an array".into())),
    }
}

#[async_trait]
impl Tool for CliTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> Schema {
        Schema::object()
            .property("args", Schema::array(Schema::string()))
            .build()
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let argv = parse_args(&args)?;
        let command_line = argv.join(" ");
        if is_forbidden(&command_line) {
            return Err(ToolError::Forbidden(format!(
                "{} {}",
                self.tool_name, command_line
            )));
        }

        debug!("exec {} {}", self.program.display(), command_line);

        let mut command = Command::new(&self.program);
        command
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| ToolError::Process(format!("failed to start {}: {e}", self.program.display())))?;

        // Dropping the child future on cancellation kills the process.
        let output = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(ToolError::Cancelled),
            output = child.wait_with_output() => output?,
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(ToolError::Process(format!(
                "{} ({}): {}",
                self.tool_name,
                output.status,
                combined.trim()
            )));
        }

        Ok(ToolOutput::Text(combined))
    }
}
