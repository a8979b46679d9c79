//! Helpers shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use lynexus::agent::CancelHandle;
use lynexus::llm::{ChatMessage, ModelClient, SamplingConfig, TransportError};
use lynexus::tools::{LocalProvider, ParamSpec, ParamType};
use lynexus::{SessionConfig, ToolRegistry};

/// Model double that answers from a script and records every request
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    /// Used once the script runs out
    fallback: Option<String>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    cancel_on_call: Mutex<Option<(usize, CancelHandle)>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            ..Default::default()
        }
    }

    /// Gives the same reply forever
    pub fn repeating(reply: &str) -> Self {
        Self {
            fallback: Some(reply.to_string()),
            ..Default::default()
        }
    }

    /// Queue a transport failure at the end of the script
    pub fn then_fail(self, message: &str) -> Self {
        self.replies.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn then_reply(self, reply: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
        self
    }

    /// Request cancellation while call number `call` (1-based) is in flight
    pub fn cancel_during_call(&self, call: usize, handle: CancelHandle) {
        *self.cancel_on_call.lock().unwrap() = Some((call, handle));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, call: usize) -> Vec<ChatMessage> {
        self.requests.lock().unwrap()[call - 1].clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _sampling: &SamplingConfig,
    ) -> Result<String, TransportError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(messages.to_vec());
            requests.len()
        };

        if let Some((at, handle)) = self.cancel_on_call.lock().unwrap().as_ref() {
            if *at == call {
                handle.cancel();
            }
        }

        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(TransportError::Other(message)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| TransportError::Other("script exhausted".to_string())),
        }
    }
}

/// Preset using `CMD:` / `|` markers
pub fn cmd_config(max_iterations: usize) -> SessionConfig {
    SessionConfig {
        command_start: "CMD:".to_string(),
        command_separator: "|".to_string(),
        max_iterations,
        ..Default::default()
    }
}

/// Registry with `add(a: number, b: number)`
pub async fn math_registry() -> Arc<ToolRegistry> {
    let math = LocalProvider::new("math").function(
        "add",
        "Add two numbers",
        vec![
            ParamSpec::required("a", ParamType::Number),
            ParamSpec::required("b", ParamType::Number),
        ],
        |args| Ok((args.f64("a")? + args.f64("b")?).to_string()),
    );
    Arc::new(ToolRegistry::builder().provider(math).build().await.unwrap())
}
