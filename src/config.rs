//! Session configuration (presets)
//!
//! A preset is a JSON or YAML document holding everything a session needs:
//!
//! ```yaml
//! model:
//!   provider: openai
//!   api_base: https://api.deepseek.com
//!   api_key: sk-...
//!   model: deepseek-chat
//! sampling:
//!   temperature: 0.7
//! command_start: "YLDEXECUTE:"
//! command_separator: "￥|"
//! max_iterations: 15
//! tools:
//!   builtin: [files, system, network]
//!   mcp_configs: [./tools/mcp_config.json]
//! ```
//!
//! Every field has a default, so an empty document is a valid preset.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::{ModelEndpoint, SamplingConfig};
use crate::protocol::{Markers, DEFAULT_COMMAND_SEPARATOR, DEFAULT_COMMAND_START};
use crate::tools::{builtin, ToolSources};

/// Placeholder replaced by the tool output in `tool_result_template`
pub const RESULT_PLACEHOLDER: &str = "{result}";

/// Configuration consumed by a conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub model: ModelEndpoint,
    pub sampling: SamplingConfig,
    pub command_start: String,
    pub command_separator: String,
    /// Model round-trips allowed per submission
    pub max_iterations: usize,
    /// Replaces the generated default prompt when set
    pub system_prompt: Option<String>,
    /// How tool turns are rendered for the model
    pub tool_result_template: String,
    pub tools: ToolSources,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: ModelEndpoint::default(),
            sampling: SamplingConfig::default(),
            command_start: DEFAULT_COMMAND_START.to_string(),
            command_separator: DEFAULT_COMMAND_SEPARATOR.to_string(),
            max_iterations: 15,
            system_prompt: None,
            tool_result_template: format!("Execution result: {}", RESULT_PLACEHOLDER),
            tools: ToolSources::default(),
        }
    }
}

/// Error type for loading and validating presets
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
    UnsupportedFormat(PathBuf),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            ConfigError::Json(e) => write!(f, "Invalid JSON preset: {}", e),
            ConfigError::Yaml(e) => write!(f, "Invalid YAML preset: {}", e),
            ConfigError::UnsupportedFormat(path) => write!(
                f,
                "Unsupported preset format: {} (expected .json, .yaml or .yml)",
                path.display()
            ),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

impl SessionConfig {
    /// Load and validate a preset; the format follows the file extension
    ///
    /// Relative `mcp_configs` paths are resolved against the preset's
    /// directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text)?,
            Some("yaml") | Some("yml") => Self::from_yaml(&text)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        if let Some(base) = path.parent() {
            for mcp in &mut config.tools.mcp_configs {
                if mcp.is_relative() {
                    *mcp = base.join(&*mcp);
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_start.trim().is_empty() {
            return Err(ConfigError::Invalid("command_start must not be empty".into()));
        }
        if self.command_separator.is_empty() {
            return Err(ConfigError::Invalid("command_separator must not be empty".into()));
        }
        if self.command_start.contains(self.command_separator.as_str()) {
            return Err(ConfigError::Invalid(
                "command_start must not contain command_separator".into(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid("max_iterations must be at least 1".into()));
        }
        if !self.tool_result_template.contains(RESULT_PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "tool_result_template must contain {}",
                RESULT_PLACEHOLDER
            )));
        }
        for name in &self.tools.builtin {
            if !builtin::PACKS.contains(&name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "unknown builtin tool pack '{}' (available: {})",
                    name,
                    builtin::PACKS.join(", ")
                )));
            }
        }
        Ok(())
    }

    pub fn markers(&self) -> Markers {
        Markers::new(self.command_start.clone(), self.command_separator.clone())
    }

    /// Render a tool result through `tool_result_template`
    pub fn render_tool_result(&self, result: &str) -> String {
        self.tool_result_template.replace(RESULT_PLACEHOLDER, result)
    }

    /// Copy safe to print or save: the API key is removed
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.model.api_key = None;
        copy
    }
}
