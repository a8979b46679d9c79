//! Local tool provider
//!
//! Local tools are plain Rust functions registered with an explicit
//! parameter list and description:
//!
//! ```ignore
//! let math = LocalProvider::new("math").function(
//!     "add",
//!     "Add two numbers",
//!     vec![
//!         ParamSpec::required("a", ParamType::Number),
//!         ParamSpec::required("b", ParamType::Number),
//!     ],
//!     |args| Ok((args.f64("a")? + args.f64("b")?).to_string()),
//! );
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use super::{ParamSpec, ToolArgs, ToolDescriptor, ToolError, ToolHandle, ToolOutput, ToolProvider};

/// A named set of in-process tool functions
#[derive(Debug, Clone)]
pub struct LocalProvider {
    source: String,
    tools: Vec<ToolDescriptor>,
}

impl LocalProvider {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            tools: Vec::new(),
        }
    }

    /// Register a function
    pub fn function<F>(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
        f: F,
    ) -> Self
    where
        F: Fn(ToolArgs) -> ToolOutput + Send + Sync + 'static,
    {
        self.tools.push(ToolDescriptor {
            name: name.into(),
            params,
            description: description.into(),
            handle: ToolHandle::Local(Arc::new(f)),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolProvider for LocalProvider {
    fn source(&self) -> &str {
        &self.source
    }

    async fn load(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        Ok(self.tools.clone())
    }
}
