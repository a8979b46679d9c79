//! Lynexus - tool-calling conversation loop for chat models
//!
//! A model asks for a tool by answering with a marked command line
//! (`YLDEXECUTE:ls￥|/tmp`). The session parses it, runs the tool, feeds the
//! result back, and repeats until the model answers in prose or the
//! iteration budget runs out.
//!
//! # Modules
//!
//! - `protocol` - command line parsing and formatting
//! - `tools` - tool descriptors, local providers, built-in packs, registry
//! - `mcp` - MCP stdio servers as remote tool providers
//! - `agent` - dispatcher, conversation session state machine, transcripts
//! - `llm` - model clients (OpenAI-compatible, Ollama)
//! - `prompt` - system prompt and tool listing
//! - `config` - session presets (JSON / YAML)
//! - `metrics` - Prometheus metrics
//! - `tracing` - logging and OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use lynexus::{llm, ConversationSession, SessionConfig, ToolRegistry};
//!
//! let config = SessionConfig::from_file("preset.yaml")?;
//! let registry = Arc::new(ToolRegistry::from_sources(&config.tools).await?);
//! let model = llm::client_for(&config.model);
//!
//! let mut session = ConversationSession::new(config, registry, model);
//! let outcome = session.submit("What is in /tmp?").await?;
//! println!("{}", outcome.content);
//! ```

pub mod agent;
pub mod config;
pub mod llm;
pub mod mcp;
pub mod metrics;
pub mod prompt;
pub mod protocol;
pub mod tools;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{
    ConversationSession, ExecutionResult, SessionError, SessionState, SubmitOutcome, Turn,
};
pub use config::SessionConfig;
pub use protocol::{format_command, parse_command, Markers, ParsedCommand};
pub use tools::{ToolDescriptor, ToolError, ToolRegistry};
