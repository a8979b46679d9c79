//! Dispatcher - turns a parsed command into an execution result
//!
//! ```text
//! ParsedCommand ──► resolve ──► bind params ──► coerce ──► invoke ──► ExecutionResult
//!                     │              │             │           │
//!                 NotFound       Validation    Validation   Execution
//! ```
//!
//! Every failure along the way is packaged as an unsuccessful
//! [`ExecutionResult`]; nothing here returns an error to the session.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info_span, warn, Instrument};

use crate::metrics::{TOOL_CALLS, TOOL_CALL_DURATION};
use crate::protocol::{ParsedCommand, ProtocolError};
use crate::tools::{ToolArgs, ToolDescriptor, ToolError, ToolRegistry};

/// Outcome of one dispatched command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    /// Tool output, or a description of what went wrong
    pub content: String,
}

impl ExecutionResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
        }
    }

    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            success: false,
            content: content.into(),
        }
    }

    /// Explanation sent back when the model wrote a malformed command
    pub fn protocol_error(error: &ProtocolError) -> Self {
        Self::failure(format!("Malformed command: {}", error))
    }
}

impl From<ToolError> for ExecutionResult {
    fn from(e: ToolError) -> Self {
        Self::failure(e.to_string())
    }
}

/// Resolves and runs commands against a shared registry
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run one command
    pub async fn dispatch(&self, command: &ParsedCommand) -> ExecutionResult {
        let span = info_span!(
            "tool_call",
            tool = %command.tool,
            params = command.params.len(),
            otel.name = "tool_call"
        );

        async {
            let tool = match self.registry.resolve(&command.tool) {
                Ok(tool) => tool,
                Err(e) => {
                    warn!(tool = %command.tool, "Model requested an unknown tool");
                    TOOL_CALLS.with_label_values(&[&command.tool, "not_found"]).inc();
                    return ExecutionResult::from(e);
                }
            };

            let args = match bind_params(tool, &command.params) {
                Ok(args) => args,
                Err(e) => {
                    warn!(tool = %command.tool, error = %e, "Rejected tool parameters");
                    TOOL_CALLS.with_label_values(&[&command.tool, "invalid"]).inc();
                    return ExecutionResult::from(e);
                }
            };

            debug!(tool = %tool.name, kind = tool.handle.kind(), args = args.len(), "Invoking tool");
            let start = Instant::now();
            let outcome = tool.handle.invoke(args).await;
            let elapsed = start.elapsed();

            TOOL_CALL_DURATION
                .with_label_values(&[&tool.name])
                .observe(elapsed.as_secs_f64());

            match outcome {
                Ok(output) => {
                    debug!(
                        tool = %tool.name,
                        duration_ms = elapsed.as_secs_f64() * 1000.0,
                        output_len = output.len(),
                        "Tool succeeded"
                    );
                    TOOL_CALLS.with_label_values(&[&tool.name, "success"]).inc();
                    ExecutionResult::success(output)
                }
                Err(e) => {
                    warn!(tool = %tool.name, error = %e, "Tool failed");
                    TOOL_CALLS.with_label_values(&[&tool.name, "failure"]).inc();
                    ExecutionResult::from(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Bind raw command fields to the descriptor's parameters
///
/// For remote tools, a field `key=value` whose key names a declared, not yet
/// bound parameter binds by name. Every other field fills the remaining
/// parameters in declaration order. Local tools bind positionally only, so
/// free text such as `mode=a` reaches the parameter in its position.
/// Each bound value is coerced to the declared type.
pub fn bind_params(tool: &ToolDescriptor, raw: &[String]) -> Result<ToolArgs, ToolError> {
    let mut slots: Vec<Option<&str>> = vec![None; tool.params.len()];
    let mut positional = Vec::new();
    let by_name = tool.handle.binds_by_name();

    for field in raw {
        let keyword = field.split_once('=').filter(|_| by_name).and_then(|(key, value)| {
            let key = key.trim();
            tool.params
                .iter()
                .position(|p| p.name == key)
                .filter(|&i| slots[i].is_none())
                .map(|i| (i, value.trim()))
        });
        match keyword {
            Some((i, value)) => slots[i] = Some(value),
            None => positional.push(field.as_str()),
        }
    }

    let mut positional = positional.into_iter();
    for slot in slots.iter_mut().filter(|s| s.is_none()) {
        match positional.next() {
            Some(value) => *slot = Some(value),
            None => break,
        }
    }

    if positional.next().is_some() {
        let required = tool.required_count();
        let accepted = if required == tool.params.len() {
            required.to_string()
        } else {
            format!("{} to {}", required, tool.params.len())
        };
        return Err(ToolError::Validation(format!(
            "{} takes {} parameter(s), got {}; expected {}",
            tool.name,
            accepted,
            raw.len(),
            tool.signature()
        )));
    }

    let mut args = ToolArgs::new();
    for (param, slot) in tool.params.iter().zip(slots) {
        match slot {
            Some(value) => {
                let value = param.ty.coerce(value).map_err(|e| {
                    ToolError::Validation(format!("parameter '{}': {}", param.name, e))
                })?;
                args.push(param.name.clone(), value);
            }
            None if param.required => {
                return Err(ToolError::Validation(format!(
                    "missing required parameter '{}'; expected {}",
                    param.name,
                    tool.signature()
                )));
            }
            None => {}
        }
    }

    Ok(args)
}
