//! Model invocation
//!
//! The conversation loop talks to a model through one operation,
//! [`ModelClient::complete`]: ordered history plus sampling settings in,
//! assistant text out. Two HTTP implementations are provided:
//!
//! - [`OpenAiClient`] - OpenAI-compatible `/chat/completions` (DeepSeek,
//!   OpenAI, vLLM, ...)
//! - [`OllamaClient`] - Ollama's `/api/chat`

pub mod ollama;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// A message in the history sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant", "tool"
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling parameters forwarded with every model call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub top_p: f32,
    pub stop: Option<Vec<String>>,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            max_tokens: Some(2048),
            top_p: 1.0,
            stop: None,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        }
    }
}

/// Which wire protocol the endpoint speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    OpenAi,
    Ollama,
}

/// Where and how to reach the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelEndpoint {
    pub provider: ModelProvider,
    pub api_base: String,
    /// Sent as a bearer token when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ModelEndpoint {
    fn default() -> Self {
        Self {
            provider: ModelProvider::OpenAi,
            api_base: "https://api.deepseek.com".to_string(),
            api_key: None,
            model: "deepseek-chat".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Error type for model calls
#[derive(Debug)]
pub enum TransportError {
    Request(reqwest::Error),
    /// Non-success HTTP status
    Status { code: u16, body: String },
    Parse(serde_json::Error),
    EmptyResponse,
    /// Failure reported by a non-HTTP client
    Other(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Request(e) => write!(f, "Request error: {}", e),
            TransportError::Status { code, body } => write!(f, "HTTP {}: {}", code, body),
            TransportError::Parse(e) => write!(f, "Parse error: {}", e),
            TransportError::EmptyResponse => write!(f, "Empty response from model"),
            TransportError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Request(e)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Parse(e)
    }
}

/// The model-invocation collaborator
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model name, used for logging and metric labels
    fn model(&self) -> &str;

    /// Produce the next assistant message for `messages`
    async fn complete(
        &self,
        messages: &[ChatMessage],
        sampling: &SamplingConfig,
    ) -> Result<String, TransportError>;
}

/// Build the HTTP client matching `endpoint.provider`
pub fn client_for(endpoint: &ModelEndpoint) -> Arc<dyn ModelClient> {
    match endpoint.provider {
        ModelProvider::OpenAi => Arc::new(OpenAiClient::new(endpoint)),
        ModelProvider::Ollama => Arc::new(OllamaClient::new(endpoint)),
    }
}

fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_construction() {
        assert_eq!(ChatMessage::system("s").role, "system");
        assert_eq!(ChatMessage::user("u").role, "user");
        assert_eq!(ChatMessage::assistant("a").role, "assistant");
        assert_eq!(ChatMessage::tool("t").role, "tool");
    }

    #[test]
    fn test_endpoint_deserializes_with_defaults() {
        let endpoint: ModelEndpoint =
            serde_json::from_str(r#"{"provider": "ollama", "model": "qwen3"}"#).unwrap();
        assert_eq!(endpoint.provider, ModelProvider::Ollama);
        assert_eq!(endpoint.model, "qwen3");
        assert_eq!(endpoint.api_base, "https://api.deepseek.com");
        assert!(endpoint.api_key.is_none());
    }

    #[test]
    fn test_api_key_not_serialized_when_absent() {
        let json = serde_json::to_string(&ModelEndpoint::default()).unwrap();
        assert!(!json.contains("api_key"));
    }
}
