//! Tool descriptors and the providers that produce them
//!
//! A tool is a named capability with an ordered parameter list. Two kinds
//! of tools share the same descriptor:
//!
//! - **Local** tools are Rust functions registered explicitly through a
//!   [`LocalProvider`] (see [`builtin`] for the packs that ship with the crate)
//! - **Remote** tools proxy a `tools/call` request to an MCP server process
//!   (see [`crate::mcp`])
//!
//! Providers are merged into an immutable [`ToolRegistry`] once, before any
//! session starts.

pub mod builtin;
pub mod local;
pub mod network;
pub mod registry;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::mcp::RemoteTool;

pub use local::LocalProvider;
pub use registry::{RegistryBuilder, ToolRegistry, ToolSources};

/// Declared type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// Accepts anything: JSON if the text parses as JSON, a string otherwise
    Any,
}

impl ParamType {
    /// Map a JSON Schema `type` keyword
    pub fn from_schema_type(ty: &str) -> Self {
        match ty {
            "string" => ParamType::String,
            "integer" => ParamType::Integer,
            "number" => ParamType::Number,
            "boolean" => ParamType::Boolean,
            "array" => ParamType::Array,
            "object" => ParamType::Object,
            _ => ParamType::Any,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Any => "any",
        }
    }

    /// Best-effort conversion of a raw command field to this type
    pub fn coerce(&self, raw: &str) -> Result<Value, String> {
        match self {
            ParamType::String => Ok(Value::String(raw.to_string())),
            ParamType::Integer => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("expected an integer, got '{}'", raw)),
            ParamType::Number => {
                if let Ok(n) = raw.parse::<i64>() {
                    return Ok(Value::from(n));
                }
                raw.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| format!("expected a number, got '{}'", raw))
            }
            ParamType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("expected true or false, got '{}'", raw)),
            },
            ParamType::Array => match serde_json::from_str::<Value>(raw) {
                Ok(v @ Value::Array(_)) => Ok(v),
                _ => Err(format!("expected a JSON array, got '{}'", raw)),
            },
            ParamType::Object => match serde_json::from_str::<Value>(raw) {
                Ok(v @ Value::Object(_)) => Ok(v),
                _ => Err(format!("expected a JSON object, got '{}'", raw)),
            },
            ParamType::Any => {
                Ok(serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
            }
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared parameter of a tool
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty)
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Coerced arguments bound to a tool's declared parameters
///
/// Values are kept in declaration order. Optional parameters the model did
/// not supply are simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    values: Vec<(String, Value)>,
}

impl ToolArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.values.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::Validation(format!("parameter '{}' must be a string", name)))
    }

    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).and_then(Value::as_str).unwrap_or(default)
    }

    pub fn i64(&self, name: &str) -> Result<i64, ToolError> {
        self.get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| ToolError::Validation(format!("parameter '{}' must be an integer", name)))
    }

    pub fn f64(&self, name: &str) -> Result<f64, ToolError> {
        self.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| ToolError::Validation(format!("parameter '{}' must be a number", name)))
    }

    pub fn bool(&self, name: &str) -> Result<bool, ToolError> {
        self.get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| ToolError::Validation(format!("parameter '{}' must be a boolean", name)))
    }

    /// Named arguments as a JSON object, the shape MCP `tools/call` expects
    pub fn to_json_object(&self) -> serde_json::Map<String, Value> {
        self.values.iter().cloned().collect()
    }
}

/// What a local tool function returns
pub type ToolOutput = Result<String, Box<dyn std::error::Error + Send + Sync>>;

/// A registered local tool function
pub type LocalFn = Arc<dyn Fn(ToolArgs) -> ToolOutput + Send + Sync>;

/// How a descriptor is executed
#[derive(Clone)]
pub enum ToolHandle {
    /// In-process Rust function, run on the blocking pool
    Local(LocalFn),
    /// Proxy to an operation exposed by an MCP server process
    Remote(RemoteTool),
}

impl ToolHandle {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolHandle::Local(_) => "local",
            ToolHandle::Remote(_) => "remote",
        }
    }

    /// Whether `key=value` fields may bind by parameter name
    ///
    /// Only MCP tools do: their arguments travel as a named object, while
    /// local tools take free text where `=` is ordinary content.
    pub fn binds_by_name(&self) -> bool {
        matches!(self, ToolHandle::Remote(_))
    }

    /// Run the tool
    ///
    /// Local functions run through `spawn_blocking`, so a panicking tool
    /// surfaces as an execution error instead of unwinding through the
    /// session.
    pub async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        match self {
            ToolHandle::Local(f) => {
                let f = Arc::clone(f);
                match tokio::task::spawn_blocking(move || f(args)).await {
                    Ok(Ok(output)) => Ok(output),
                    Ok(Err(e)) => Err(ToolError::Execution(e.to_string())),
                    Err(join) if join.is_panic() => {
                        Err(ToolError::Execution("tool panicked during execution".to_string()))
                    }
                    Err(join) => Err(ToolError::Execution(join.to_string())),
                }
            }
            ToolHandle::Remote(remote) => remote.call(args.to_json_object()).await,
        }
    }
}

impl std::fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolHandle::Local(_) => f.write_str("Local(<fn>)"),
            ToolHandle::Remote(remote) => write!(f, "Remote({:?})", remote),
        }
    }
}

/// A resolved, executable tool
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    /// Unique name within a registry
    pub name: String,
    /// Parameters in declaration order
    pub params: Vec<ParamSpec>,
    pub description: String,
    pub handle: ToolHandle,
}

impl ToolDescriptor {
    /// Human-readable signature, e.g. `add(a: number, b: number)`
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| {
                if p.required {
                    format!("{}: {}", p.name, p.ty)
                } else {
                    format!("{}?: {}", p.name, p.ty)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, params)
    }

    /// Number of parameters the model must supply
    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|p| p.required).count()
    }
}

/// Error type for tool resolution and execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// No tool with this name is registered
    NotFound(String),
    /// Arity or type mismatch between the command and the descriptor
    Validation(String),
    /// The tool itself failed
    Execution(String),
    /// A tool source could not be loaded
    Source(String),
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolError::NotFound(name) => write!(f, "Tool '{}' does not exist", name),
            ToolError::Validation(msg) => write!(f, "Invalid parameters: {}", msg),
            ToolError::Execution(msg) => write!(f, "Execution failed: {}", msg),
            ToolError::Source(msg) => write!(f, "Failed to load tools: {}", msg),
        }
    }
}

impl std::error::Error for ToolError {}

/// A source of tool descriptors
///
/// Providers are consulted once, in declaration order, while a registry is
/// built.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Short label used in logs
    fn source(&self) -> &str;

    /// Produce the descriptors this provider contributes
    async fn load(&self) -> Result<Vec<ToolDescriptor>, ToolError>;
}
