//! Stdio JSON-RPC client for one MCP server process
//!
//! Requests carry a numeric id. A background task reads the child's stdout
//! line by line and hands each response to the waiter registered under its
//! id; notifications and non-JSON lines are logged and dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::ServerConfig;

/// Protocol version sent in `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

type Waiter = oneshot::Sender<RpcResponse>;
type PendingMap = Arc<Mutex<HashMap<u64, Waiter>>>;

/// Error type for MCP operations
#[derive(Debug)]
pub enum McpError {
    /// The config file is unreadable or malformed
    Config(String),
    /// The server process could not be started
    Spawn(String),
    Io(std::io::Error),
    /// No response within the server's timeout
    Timeout { method: String },
    /// The server exited or closed stdout
    Closed,
    /// The server answered with a JSON-RPC error
    Rpc { code: i64, message: String },
    /// The server answered with something we could not interpret
    Protocol(String),
}

impl std::fmt::Display for McpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            McpError::Config(msg) => write!(f, "MCP config error: {}", msg),
            McpError::Spawn(msg) => write!(f, "Failed to start MCP server: {}", msg),
            McpError::Io(e) => write!(f, "MCP I/O error: {}", e),
            McpError::Timeout { method } => write!(f, "MCP request timed out: {}", method),
            McpError::Closed => write!(f, "MCP server closed the connection"),
            McpError::Rpc { code, message } => write!(f, "MCP error {}: {}", code, message),
            McpError::Protocol(msg) => write!(f, "MCP protocol error: {}", msg),
        }
    }
}

impl std::error::Error for McpError {}

impl From<std::io::Error> for McpError {
    fn from(e: std::io::Error) -> Self {
        McpError::Io(e)
    }
}

impl From<serde_json::Error> for McpError {
    fn from(e: serde_json::Error) -> Self {
        McpError::Protocol(e.to_string())
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Any message read from the server
#[derive(Debug, Deserialize)]
struct RpcMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

/// A tool advertised by `tools/list`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Value,
}

/// One content part of a `tools/call` result
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Result of `tools/call`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    /// Text parts joined with newlines; other parts are named by type
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|part| match &part.text {
                Some(text) if part.kind == "text" => text.clone(),
                _ => format!("[{} content]", part.kind),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Connection to a running MCP server
pub struct McpClient {
    server: String,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    child: tokio::sync::Mutex<Option<Child>>,
    pending: PendingMap,
    next_id: AtomicU64,
    timeout: Duration,
}

impl McpClient {
    /// Spawn the server process and wire up the reader tasks
    pub fn spawn(server: &str, config: &ServerConfig) -> Result<Self, McpError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| McpError::Spawn(format!("{} ({}): {}", server, config.command, e)))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Spawn(format!("{}: stdout not captured", server)))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(read_stdout(server.to_string(), stdout, Arc::clone(&pending)));

        if let Some(stderr) = child.stderr.take() {
            let name = server.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = %name, "stderr: {}", line);
                }
            });
        }

        Ok(Self {
            server: server.to_string(),
            stdin: tokio::sync::Mutex::new(stdin),
            child: tokio::sync::Mutex::new(Some(child)),
            pending,
            next_id: AtomicU64::new(1),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Spawn and run the initialize handshake
    pub async fn start(server: &str, config: &ServerConfig) -> Result<Self, McpError> {
        let client = Self::spawn(server, config)?;
        if let Err(e) = client.initialize().await {
            client.shutdown().await;
            return Err(e);
        }
        Ok(client)
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// `initialize` followed by `notifications/initialized`
    pub async fn initialize(&self) -> Result<Value, McpError> {
        let result = self
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
            .await?;
        self.notify("notifications/initialized", json!({})).await?;
        info!(server = %self.server, "MCP server initialized");
        Ok(result)
    }

    pub async fn list_tools(&self) -> Result<Vec<McpToolInfo>, McpError> {
        let result = self.request("tools/list", json!({})).await?;
        let tools = result.get("tools").cloned().unwrap_or_else(|| json!([]));
        Ok(serde_json::from_value(tools)?)
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Map<String, Value>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a request and wait for the response with the same id
    async fn request(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        let message = RpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        };
        if let Err(e) = self.write(&message).await {
            lock(&self.pending).remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(McpError::Closed),
            Err(_) => {
                lock(&self.pending).remove(&id);
                warn!(server = %self.server, method, "MCP request timed out");
                return Err(McpError::Timeout {
                    method: method.to_string(),
                });
            }
        };

        if let Some(error) = response.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), McpError> {
        self.write(&RpcRequest {
            jsonrpc: "2.0",
            id: None,
            method,
            params,
        })
        .await
    }

    async fn write(&self, message: &RpcRequest<'_>) -> Result<(), McpError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let mut stdin = self.stdin.lock().await;
        let stdin = stdin.as_mut().ok_or(McpError::Closed)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Close stdin, give the server a moment to exit, then kill it
    pub async fn shutdown(&self) {
        self.stdin.lock().await.take();

        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };
        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(_) => info!(server = %self.server, "MCP server stopped"),
            Err(_) => {
                let _ = child.kill().await;
                warn!(server = %self.server, "MCP server killed after shutdown timeout");
            }
        }
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("server", &self.server)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn lock(pending: &PendingMap) -> std::sync::MutexGuard<'_, HashMap<u64, Waiter>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn read_stdout(server: String, stdout: ChildStdout, pending: PendingMap) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(server = %server, error = %e, "Failed to read from MCP server");
                break;
            }
        };

        let line = line.trim();
        if !line.starts_with('{') {
            if !line.is_empty() {
                debug!(server = %server, "Ignoring non-JSON output: {}", line);
            }
            continue;
        }

        let message: RpcMessage = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                debug!(server = %server, error = %e, "Ignoring malformed JSON-RPC message");
                continue;
            }
        };

        if let Some(method) = message.method {
            debug!(server = %server, method = %method, "Ignoring server-initiated message");
            continue;
        }

        let Some(id) = message.id.as_ref().and_then(Value::as_u64) else {
            debug!(server = %server, "Ignoring response without numeric id");
            continue;
        };

        match lock(&pending).remove(&id) {
            Some(waiter) => {
                let _ = waiter.send(RpcResponse {
                    result: message.result,
                    error: message.error,
                });
            }
            None => warn!(server = %server, id, "Response for unknown request id"),
        }
    }

    // Dropping the waiters wakes every caller with `Closed`
    lock(&pending).clear();
    debug!(server = %server, "MCP stdout closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_result_text() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                { "type": "text", "text": "12:00" },
                { "type": "image", "data": "..." },
                { "type": "text", "text": "UTC" }
            ]
        }))
        .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.text(), "12:00\n[image content]\nUTC");
    }

    #[test]
    fn test_request_serialization() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: Some(7),
            method: "tools/list",
            params: json!({}),
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/list","params":{}}"#
        );

        let notification = RpcRequest {
            jsonrpc: "2.0",
            id: None,
            method: "notifications/initialized",
            params: json!({}),
        };
        assert!(!serde_json::to_string(&notification).unwrap().contains("\"id\""));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let config = ServerConfig::new("/nonexistent/lynexus-mcp-server", vec![]);
        assert!(matches!(
            McpClient::spawn("ghost", &config),
            Err(McpError::Spawn(_))
        ));
    }
}
