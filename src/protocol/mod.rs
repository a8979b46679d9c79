//! Command protocol for tool requests embedded in model output
//!
//! The model asks for a tool by emitting a turn that consists of nothing
//! but a command line:
//!
//! ```text
//! <command_start><tool_name><separator><param_1><separator><param_2>...
//!
//! YLDEXECUTE: ls ￥| /tmp
//! CMD:add|2|3
//! ```
//!
//! A turn that does not start with the start marker is prose, even if the
//! marker shows up somewhere inside it. Parameters stay textual here; type
//! coercion belongs to the dispatcher.

use serde::{Deserialize, Serialize};

/// Default start marker
pub const DEFAULT_COMMAND_START: &str = "YLDEXECUTE:";

/// Default field separator
pub const DEFAULT_COMMAND_SEPARATOR: &str = "￥|";

/// The two strings that delimit a command in model output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markers {
    pub command_start: String,
    pub command_separator: String,
}

impl Markers {
    pub fn new(command_start: impl Into<String>, command_separator: impl Into<String>) -> Self {
        Self {
            command_start: command_start.into(),
            command_separator: command_separator.into(),
        }
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_START, DEFAULT_COMMAND_SEPARATOR)
    }
}

/// A tool request extracted from a model turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Name of the requested tool
    pub tool: String,
    /// Raw parameters in the order the model wrote them
    pub params: Vec<String>,
}

impl ParsedCommand {
    pub fn new(tool: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            tool: tool.into(),
            params,
        }
    }
}

/// The start marker was present but the command could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Nothing followed the start marker
    Empty,
    /// The first field was blank (e.g. `CMD:|x`)
    MissingToolName,
    /// The tool name contains whitespace, which no registered tool can match
    InvalidToolName(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Empty => write!(f, "no tool name after the command marker"),
            ProtocolError::MissingToolName => write!(f, "the first command field must be the tool name"),
            ProtocolError::InvalidToolName(name) => {
                write!(f, "'{}' is not a valid tool name", name)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Outcome of scanning one model turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parse {
    /// The turn is prose
    NoCommand,
    /// The turn is a well-formed command
    Command(ParsedCommand),
    /// The turn starts with the marker but is malformed
    Malformed(ProtocolError),
}

/// Scan a model turn for a command
///
/// Leading and trailing whitespace of the turn is ignored, as is whitespace
/// around each field. Every field after the tool name is kept, including
/// empty ones: `CMD:concat||b` carries two parameters, the first blank.
pub fn parse_command(output: &str, markers: &Markers) -> Parse {
    let output = output.trim();

    let Some(rest) = output.strip_prefix(markers.command_start.as_str()) else {
        return Parse::NoCommand;
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return Parse::Malformed(ProtocolError::Empty);
    }

    let mut fields = rest.split(markers.command_separator.as_str()).map(str::trim);

    let tool = fields.next().unwrap_or_default();
    if tool.is_empty() {
        return Parse::Malformed(ProtocolError::MissingToolName);
    }
    if tool.chars().any(char::is_whitespace) {
        return Parse::Malformed(ProtocolError::InvalidToolName(tool.to_string()));
    }

    let params = fields.map(str::to_string).collect();

    Parse::Command(ParsedCommand::new(tool, params))
}

/// Render a command the way the model is expected to write it
pub fn format_command(command: &ParsedCommand, markers: &Markers) -> String {
    let mut out = String::with_capacity(
        markers.command_start.len() + command.tool.len() + command.params.iter().map(|p| p.len() + 1).sum::<usize>(),
    );
    out.push_str(&markers.command_start);
    out.push_str(&command.tool);
    for param in &command.params {
        out.push_str(&markers.command_separator);
        out.push_str(param);
    }
    out
}
