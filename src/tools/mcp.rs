//! MCP (Model Context Protocol) servers over stdio.
//!
//! Each configured server is spawned once per session. Requests on one
//! connection are strictly sequential: the client writes a JSON-RPC request
//! and reads lines until the matching response arrives, answering `ping`
//! and skipping notifications on the way.

use super::{Schema, Tool, ToolArgs, ToolContext, ToolError, ToolOutput, ToolProvider};
use crate::config::McpServerConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";

type Reader = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

struct Connection {
    reader: Reader,
    writer: Writer,
    next_id: u64,
}

/// A connected MCP server.
pub struct McpClient {
    name: String,
    conn: Mutex<Connection>,
    // Held so the server lives as long as the client; killed on drop.
    _child: Option<Child>,
}

/// A tool advertised by a server's `tools/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<McpToolInfo>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallToolResult {
    #[serde(default)]
    content: Vec<Content>,
    #[serde(default)]
    is_error: bool,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl McpClient {
    /// Spawn the configured server and run the initialize handshake.
    pub async fn spawn(config: &McpServerConfig) -> Result<Self> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &config.workdir {
            command.current_dir(shellexpand::tilde(dir).into_owned());
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to start MCP server '{}'", config.name))?;

        let stdin = child.stdin.take().context("MCP server stdin unavailable")?;
        let stdout = child.stdout.take().context("MCP server stdout unavailable")?;

        Self::connect(&config.name, stdout, stdin, Some(child)).await
    }

    /// Run the handshake over an existing stream pair.
    pub async fn connect<R, W>(name: &str, reader: R, writer: W, child: Option<Child>) -> Result<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        let client = Self {
            name: name.to_string(),
            conn: Mutex::new(Connection {
                reader: BufReader::new(reader).lines(),
                writer: Box::new(writer),
                next_id: 1,
            }),
            _child: child,
        };

        let init = client
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "capabilities": {}
                }),
            )
            .await
            .with_context(|| format!("MCP server '{name}' failed to initialize"))?;

        let server = init
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown server");
        debug!("[{}] initialized: {}", name, server);

        client
            .notify("notifications/initialized", json!({}))
            .await
            .with_context(|| format!("MCP server '{name}' failed to initialize"))?;

        Ok(client)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All tools, following `nextCursor` pagination.
    pub async fn list_tools(&self) -> Result<Vec<McpToolInfo>, ToolError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(result)
                .map_err(|e| ToolError::Mcp(format!("invalid tools/list result: {e}")))?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }

    /// Call a tool and flatten its text content.
    pub async fn call_tool(&self, name: &str, arguments: ToolArgs) -> Result<String, ToolError> {
        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        let result: CallToolResult = serde_json::from_value(result)
            .map_err(|e| ToolError::Mcp(format!("invalid tools/call result: {e}")))?;

        let mut texts = Vec::with_capacity(result.content.len());
        for content in &result.content {
            if content.kind != "text" {
                return Err(ToolError::Mcp(format!(
                    "unsupported content type: {}",
                    content.kind
                )));
            }
            texts.push(content.text.trim());
        }
        let text = texts.join("\n");

        if result.is_error {
            return Err(ToolError::Mcp(text));
        }
        Ok(text)
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), ToolError> {
        let mut conn = self.conn.lock().await;
        let message = json!({ "jsonrpc": "2.0", "method": method, "params": params });
        write_message(&mut conn.writer, &message).await
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ToolError> {
        let mut conn = self.conn.lock().await;
        let id = conn.next_id;
        conn.next_id += 1;

        let message = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        write_message(&mut conn.writer, &message).await?;

        loop {
            let line = conn
                .reader
                .next_line()
                .await?
                .ok_or_else(|| ToolError::Mcp(format!("server '{}' closed the connection", self.name)))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(e) => {
                    warn!("[{}] ignoring non-JSON output: {} ({})", self.name, line, e);
                    continue;
                }
            };

            match (value.get("id"), value.get("method").and_then(Value::as_str)) {
                (Some(server_id), Some(server_method)) => {
                    let reply = if server_method == "ping" {
                        json!({ "jsonrpc": "2.0", "id": server_id, "result": {} })
                    } else {
                        json!({
                            "jsonrpc": "2.0",
                            "id": server_id,
                            "error": { "code": -32601, "message": format!("method not found: {server_method}") }
                        })
                    };
                    write_message(&mut conn.writer, &reply).await?;
                }
                (None, Some(notification)) => {
                    debug!("[{}] notification: {}", self.name, notification);
                }
                (Some(response_id), None) if response_id.as_u64() == Some(id) => {
                    if let Some(error) = value.get("error") {
                        let message = error
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown error");
                        return Err(ToolError::Mcp(message.to_string()));
                    }
                    return Ok(value.get("result").cloned().unwrap_or(Value::Null));
                }
                _ => debug!("[{}] ignoring unexpected message: {}", self.name, line),
            }
        }
    }
}

async fn write_message(writer: &mut Writer, message: &Value) -> Result<(), ToolError> {
    let mut line = message.to_string();
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Servers advertise schemas without properties for argument-less tools;
/// models expect an explicit empty object.
fn normalize_schema(schema: &Value) -> Schema {
    let empty = schema
        .get("properties")
        .and_then(Value::as_object)
        .map_or(true, |props| props.is_empty());
    if empty {
        Schema::object().additional_properties(false).build()
    } else {
        Schema::Raw(schema.clone())
    }
}

/// A single server tool.
pub struct McpTool {
    client: Arc<McpClient>,
    name: String,
    description: String,
    schema: Schema,
}

impl McpTool {
    pub fn new(client: Arc<McpClient>, info: McpToolInfo) -> Self {
        Self {
            schema: normalize_schema(&info.input_schema),
            client,
            name: info.name,
            description: info.description,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        debug!("[{}] call {}", self.client.name(), self.name);
        tokio::select! {
            _ = ctx.cancel.cancelled() => Err(ToolError::Cancelled),
            text = self.client.call_tool(&self.name, args) => Ok(ToolOutput::Text(text?)),
        }
    }
}

/// Provides the tools of every configured MCP server.
pub struct McpProvider {
    servers: Vec<McpServerConfig>,
}

impl McpProvider {
    pub fn new(servers: Vec<McpServerConfig>) -> Self {
        Self { servers }
    }
}

#[async_trait]
impl ToolProvider for McpProvider {
    async fn tools(&self, _ctx: &ToolContext) -> Result<Vec<Arc<dyn Tool>>> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        for server in &self.servers {
            let client = Arc::new(McpClient::spawn(server).await?);
            let infos = client
                .list_tools()
                .await
                .with_context(|| format!("Failed to list tools of MCP server '{}'", server.name))?;
            info!("MCP server '{}': {} tools", server.name, infos.len());
            for info in infos {
                tools.push(Arc::new(McpTool::new(client.clone(), info)));
            }
        }
        Ok(tools)
    }
}
