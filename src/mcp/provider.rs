//! Remote tool provider backed by MCP servers

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::{McpClient, McpConfig};
use crate::tools::{ParamSpec, ParamType, ToolDescriptor, ToolError, ToolHandle, ToolProvider};

/// Handle for one operation exposed by an MCP server
#[derive(Clone)]
pub struct RemoteTool {
    client: Arc<McpClient>,
    tool: String,
}

impl RemoteTool {
    pub fn new(client: Arc<McpClient>, tool: impl Into<String>) -> Self {
        Self {
            client,
            tool: tool.into(),
        }
    }

    pub fn server(&self) -> &str {
        self.client.server()
    }

    pub async fn call(&self, arguments: serde_json::Map<String, Value>) -> Result<String, ToolError> {
        let result = self
            .client
            .call_tool(&self.tool, arguments)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        let text = result.text();
        if result.is_error {
            Err(ToolError::Execution(text))
        } else {
            Ok(text)
        }
    }

    pub async fn shutdown(&self) {
        self.client.shutdown().await;
    }
}

impl std::fmt::Debug for RemoteTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.client.server(), self.tool)
    }
}

/// Registry name of a proxied tool
pub fn qualified_name(server: &str, tool: &str) -> String {
    format!("mcp_{}_{}", server, tool)
}

/// Parameter specs from a tool's `inputSchema`, in property order
pub fn params_from_schema(schema: &Value) -> Vec<ParamSpec> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, prop)| {
            let ty = match prop.get("type") {
                Some(Value::String(ty)) => ParamType::from_schema_type(ty),
                // e.g. ["string", "null"]
                Some(Value::Array(types)) => types
                    .iter()
                    .filter_map(Value::as_str)
                    .find(|ty| *ty != "null")
                    .map(ParamType::from_schema_type)
                    .unwrap_or(ParamType::Any),
                _ => ParamType::Any,
            };
            ParamSpec {
                name: name.clone(),
                ty,
                required: required.contains(&name.as_str()),
                description: prop.get("description").and_then(Value::as_str).map(str::to_string),
            }
        })
        .collect()
}

/// Provider that starts every server in an MCP config
pub struct RemoteProvider {
    source: String,
    config: McpConfig,
}

impl RemoteProvider {
    pub fn new(source: impl Into<String>, config: McpConfig) -> Self {
        Self {
            source: source.into(),
            config,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ToolError> {
        let config = McpConfig::from_file(path).map_err(|e| ToolError::Source(e.to_string()))?;
        Ok(Self::new(format!("mcp:{}", path.display()), config))
    }
}

#[async_trait]
impl ToolProvider for RemoteProvider {
    fn source(&self) -> &str {
        &self.source
    }

    /// Servers that fail to start or list their tools are skipped
    async fn load(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let mut descriptors = Vec::new();

        for (server, config) in &self.config.servers {
            if !config.enabled {
                info!(server = %server, "MCP server disabled, skipping");
                continue;
            }

            let client = match McpClient::start(server, config).await {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    warn!(server = %server, error = %e, "Failed to start MCP server, skipping");
                    continue;
                }
            };

            let tools = match client.list_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    warn!(server = %server, error = %e, "Failed to list MCP tools, skipping");
                    client.shutdown().await;
                    continue;
                }
            };

            info!(server = %server, tools = tools.len(), "Loaded MCP tools");

            for tool in tools {
                descriptors.push(ToolDescriptor {
                    name: qualified_name(server, &tool.name),
                    params: params_from_schema(&tool.input_schema),
                    description: tool
                        .description
                        .clone()
                        .unwrap_or_else(|| "No description".to_string()),
                    handle: ToolHandle::Remote(RemoteTool::new(Arc::clone(&client), tool.name)),
                });
            }
        }

        Ok(descriptors)
    }
}
