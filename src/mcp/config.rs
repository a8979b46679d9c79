//! MCP server configuration (`mcpServers` format)
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "time": { "command": "uvx", "args": ["mcp-server-time"] }
//!   }
//! }
//! ```
//!
//! Servers keep the order they are written in the file.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::McpError;

/// Default per-request timeout for a server
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// How to launch one MCP server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl ServerConfig {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            enabled: true,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// A parsed MCP config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct McpConfig {
    /// Server name → launch config, in file order
    pub servers: Vec<(String, ServerConfig)>,
}

impl McpConfig {
    pub fn parse(text: &str) -> Result<Self, McpError> {
        let root: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| McpError::Config(format!("invalid JSON: {}", e)))?;

        let Some(section) = root.get("mcpServers") else {
            return Ok(Self::default());
        };
        let entries = section
            .as_object()
            .ok_or_else(|| McpError::Config("'mcpServers' must be an object".to_string()))?;

        let mut servers = Vec::with_capacity(entries.len());
        for (name, value) in entries {
            let server: ServerConfig = serde_json::from_value(value.clone())
                .map_err(|e| McpError::Config(format!("server '{}': {}", name, e)))?;
            servers.push((name.clone(), server));
        }
        Ok(Self { servers })
    }

    pub fn from_file(path: &Path) -> Result<Self, McpError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| McpError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_file_order() {
        let config = McpConfig::parse(
            r#"{
                "mcpServers": {
                    "zeta": { "command": "zeta-server" },
                    "alpha": { "command": "uvx", "args": ["mcp-server-time", "--local-timezone=UTC"], "timeout_secs": 5 }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].0, "zeta");
        assert!(config.servers[0].1.args.is_empty());
        assert!(config.servers[0].1.enabled);
        assert_eq!(config.servers[1].0, "alpha");
        assert_eq!(config.servers[1].1.args.len(), 2);
        assert_eq!(config.servers[1].1.timeout_secs, 5);
    }

    #[test]
    fn test_missing_section_is_empty() {
        assert!(McpConfig::parse("{}").unwrap().servers.is_empty());
    }

    #[test]
    fn test_invalid_configs() {
        assert!(McpConfig::parse("not json").is_err());
        assert!(McpConfig::parse(r#"{"mcpServers": []}"#).is_err());
        assert!(McpConfig::parse(r#"{"mcpServers": {"x": {"args": []}}}"#).is_err());
    }
}
