//! Ollama `/api/chat` client

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{http_client, ChatMessage, ModelClient, ModelEndpoint, SamplingConfig, TransportError};

/// Response from /api/chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub done: bool,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub eval_duration: u64,
}

/// Client for Ollama's /api/chat endpoint
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new chat client
    ///
    /// # Arguments
    /// * `endpoint` - `api_base` is the server root (e.g., "http://localhost:11434")
    pub fn new(endpoint: &ModelEndpoint) -> Self {
        Self {
            base_url: endpoint.api_base.trim_end_matches('/').to_string(),
            model: endpoint.model.clone(),
            client: http_client(endpoint.timeout_secs),
        }
    }

    /// Request body; sampling settings go under `options`
    pub fn request_body(&self, messages: &[ChatMessage], sampling: &SamplingConfig) -> Value {
        let mut options = json!({
            "temperature": sampling.temperature,
            "top_p": sampling.top_p,
            "presence_penalty": sampling.presence_penalty,
            "frequency_penalty": sampling.frequency_penalty,
        });
        if let Some(max_tokens) = sampling.max_tokens {
            options["num_predict"] = json!(max_tokens);
        }
        if let Some(stop) = &sampling.stop {
            options["stop"] = json!(stop);
        }

        json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": options,
        })
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        sampling: &SamplingConfig,
    ) -> Result<String, TransportError> {
        let endpoint = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .json(&self.request_body(messages, sampling))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                code: status.as_u16(),
                body: text,
            });
        }
        if text.is_empty() {
            return Err(TransportError::EmptyResponse);
        }

        let chat_response: ChatResponse = serde_json::from_str(&text)?;
        Ok(chat_response.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_keeps_tool_role() {
        let client = OllamaClient::new(&ModelEndpoint {
            api_base: "http://localhost:11434/".to_string(),
            model: "qwen3".to_string(),
            ..Default::default()
        });
        let sampling = SamplingConfig {
            stop: Some(vec!["</s>".to_string()]),
            ..Default::default()
        };
        let body = client.request_body(&[ChatMessage::tool("5")], &sampling);

        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(body["messages"][0]["role"], "tool");
        assert_eq!(body["options"]["num_predict"], 2048);
        assert_eq!(body["options"]["stop"][0], "</s>");
    }

    #[test]
    fn test_chat_response_parsing() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"model":"qwen3","message":{"role":"assistant","content":"hi"},"done":true,"eval_count":3}"#,
        )
        .unwrap();
        assert!(response.done);
        assert_eq!(response.message.content, "hi");
        assert_eq!(response.eval_count, 3);
    }
}
