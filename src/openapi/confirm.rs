//! Confirmation gate for mutating HTTP calls.

use super::rest::{RestExecutor, RestRequest, RestResponse};
use crate::tools::ToolError;
use async_trait::async_trait;
use colored::Colorize;
use reqwest::Method;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::info;

/// Decides whether a mutating request may proceed.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, request: &RestRequest) -> Result<bool, ToolError>;
}

/// Approves everything (`--yes`).
pub struct AutoApprove;

#[async_trait]
impl Confirm for AutoApprove {
    async fn confirm(&self, request: &RestRequest) -> Result<bool, ToolError> {
        info!("Auto-approved {} {}", request.method, request.path);
        Ok(true)
    }
}

/// Prints the request and asks on the terminal.
pub struct ConsoleConfirm;

/// Interpret an answer to a `[Y/n]` question. `None` means ask again.
pub fn parse_answer(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "" | "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

fn pretty_body(request: &RestRequest) -> Option<String> {
    let body = request.body.as_ref()?;
    let is_json = request
        .content_type
        .as_deref()
        .map_or(true, |t| t.contains("json"));
    if !is_json {
        return Some(body.clone());
    }
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    serde_json::to_string_pretty(&value).ok()
}

fn ask(request: &RestRequest) -> io::Result<bool> {
    println!(
        "{} {} {}",
        "!".yellow().bold(),
        request.method.as_str().bold(),
        request.path
    );
    if let Some(body) = pretty_body(request) {
        println!("{}", body.dimmed());
    }

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    loop {
        print!("Are you sure? [Y/n] ");
        io::stdout().flush()?;

        let mut line = String::new();
        // EOF cannot confirm anything.
        if reader.read_line(&mut line)? == 0 {
            println!();
            return Ok(false);
        }
        if let Some(answer) = parse_answer(&line) {
            return Ok(answer);
        }
    }
}

#[async_trait]
impl Confirm for ConsoleConfirm {
    async fn confirm(&self, request: &RestRequest) -> Result<bool, ToolError> {
        let request = request.clone();
        tokio::task::spawn_blocking(move || ask(&request))
            .await
            .map_err(|e| ToolError::Io(io::Error::other(e)))?
            .map_err(ToolError::from)
    }
}

/// Wraps an executor; any method other than GET/HEAD must be confirmed.
pub struct ConfirmGate {
    inner: Arc<dyn RestExecutor>,
    confirm: Arc<dyn Confirm>,
}

impl ConfirmGate {
    pub fn new(inner: Arc<dyn RestExecutor>, confirm: Arc<dyn Confirm>) -> Self {
        Self { inner, confirm }
    }
}

fn is_safe(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

#[async_trait]
impl RestExecutor for ConfirmGate {
    async fn execute(&self, request: RestRequest) -> Result<RestResponse, ToolError> {
        if !is_safe(&request.method) && !self.confirm.confirm(&request).await? {
            info!("Declined {} {}", request.method, request.path);
            return Err(ToolError::Cancelled);
        }
        self.inner.execute(request).await
    }
}
