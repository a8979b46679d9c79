//! Remote tools served by MCP (Model Context Protocol) server processes
//!
//! # Architecture
//!
//! ```text
//! mcp_config.json ──► McpConfig ──► RemoteProvider::load()
//!                                        │  per server
//!                                        ▼
//!                         spawn `command args...` (stdio pipes)
//!                                        │
//!                initialize → notifications/initialized → tools/list
//!                                        │
//!                                        ▼
//!               ToolDescriptor "mcp_<server>_<tool>" ─► RemoteTool
//!                                        │  on dispatch
//!                                        ▼
//!                          tools/call {name, arguments}
//! ```
//!
//! Messages are newline-delimited JSON-RPC 2.0 on the child's stdin/stdout.

pub mod client;
pub mod config;
pub mod provider;

pub use client::{CallToolResult, McpClient, McpError, McpToolInfo};
pub use config::{McpConfig, ServerConfig};
pub use provider::{RemoteProvider, RemoteTool};
