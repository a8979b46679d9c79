//! Tool registry - ordered, immutable name → descriptor mapping
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ builtin pack │   │ host tools   │   │ mcp config   │   (declaration order)
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        └──────────────────┼──────────────────┘
//!                           ▼
//!                 RegistryBuilder::build()
//!                           │  first registration of a name wins
//!                           ▼
//!                    Arc<ToolRegistry>  (shared read-only by sessions)
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{builtin, ToolDescriptor, ToolError, ToolHandle, ToolProvider};
use crate::mcp::RemoteProvider;

/// Declarative description of where a session's tools come from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSources {
    /// Built-in local packs, see [`builtin::PACKS`]
    pub builtin: Vec<String>,
    /// MCP server config files (`{"mcpServers": {...}}`)
    pub mcp_configs: Vec<PathBuf>,
}

/// Collects providers in declaration order
#[derive(Default)]
pub struct RegistryBuilder {
    providers: Vec<Box<dyn ToolProvider>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: impl ToolProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Add the providers described by `sources`: builtin packs first, then
    /// MCP configs, each in listed order
    pub fn sources(mut self, sources: &ToolSources) -> Result<Self, ToolError> {
        for name in &sources.builtin {
            let pack = builtin::pack(name)
                .ok_or_else(|| ToolError::Source(format!("unknown builtin tool pack '{}'", name)))?;
            self = self.provider(pack);
        }
        for path in &sources.mcp_configs {
            self = self.provider(RemoteProvider::from_file(path)?);
        }
        Ok(self)
    }

    /// Load every provider and merge the results
    pub async fn build(self) -> Result<ToolRegistry, ToolError> {
        let mut registry = ToolRegistry::default();

        for provider in &self.providers {
            let tools = provider.load().await?;
            let loaded = tools.len();
            let mut added = 0;

            for tool in tools {
                if registry.index.contains_key(&tool.name) {
                    warn!(
                        tool = %tool.name,
                        source = provider.source(),
                        "Duplicate tool name, keeping the first registration"
                    );
                    continue;
                }
                registry.index.insert(tool.name.clone(), registry.tools.len());
                registry.tools.push(tool);
                added += 1;
            }

            info!(source = provider.source(), loaded, added, "Loaded tool provider");
        }

        Ok(registry)
    }
}

/// Immutable set of tools available to sessions
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Build a registry straight from declarative sources
    pub async fn from_sources(sources: &ToolSources) -> Result<Self, ToolError> {
        RegistryBuilder::new().sources(sources)?.build().await
    }

    pub fn resolve(&self, name: &str) -> Result<&ToolDescriptor, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// All tools in registration order
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Stop every MCP server process backing a remote tool
    pub async fn shutdown(&self) {
        let mut seen = Vec::new();
        for tool in &self.tools {
            if let ToolHandle::Remote(remote) = &tool.handle {
                if !seen.contains(&remote.server()) {
                    seen.push(remote.server());
                    remote.shutdown().await;
                }
            }
        }
    }
}
