//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{http_client, ChatMessage, ModelClient, ModelEndpoint, SamplingConfig, TransportError};

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for `POST {api_base}/chat/completions`
#[derive(Clone)]
pub struct OpenAiClient {
    endpoint: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(endpoint: &ModelEndpoint) -> Self {
        Self {
            endpoint: format!("{}/chat/completions", endpoint.api_base.trim_end_matches('/')),
            api_key: endpoint.api_key.clone(),
            model: endpoint.model.clone(),
            client: http_client(endpoint.timeout_secs),
        }
    }

    /// Request body for a non-streaming completion
    ///
    /// The API only accepts `tool` messages that answer a native tool call,
    /// so tool results travel as `user` messages.
    pub fn request_body(&self, messages: &[ChatMessage], sampling: &SamplingConfig) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                let role = if m.role == "tool" { "user" } else { m.role.as_str() };
                json!({ "role": role, "content": m.content })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "temperature": sampling.temperature,
            "top_p": sampling.top_p,
            "presence_penalty": sampling.presence_penalty,
            "frequency_penalty": sampling.frequency_penalty,
        });
        if let Some(max_tokens) = sampling.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(stop) = &sampling.stop {
            body["stop"] = json!(stop);
        }
        body
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        sampling: &SamplingConfig,
    ) -> Result<String, TransportError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&self.request_body(messages, sampling));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                code: status.as_u16(),
                body: text,
            });
        }

        parse_completion(&text)
    }
}

fn parse_completion(text: &str) -> Result<String, TransportError> {
    if text.is_empty() {
        return Err(TransportError::EmptyResponse);
    }
    let response: CompletionResponse = serde_json::from_str(text)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(TransportError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(&ModelEndpoint {
            api_base: "https://api.example.com/v1/".to_string(),
            model: "test-model".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(client().endpoint, "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn test_request_body_maps_tool_role() {
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("CMD:add|2|3"),
            ChatMessage::tool("Execution result: 5"),
        ];
        let body = client().request_body(&messages, &SamplingConfig::default());

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], false);
        assert_eq!(body["max_tokens"], 2048);
        assert!(body.get("stop").is_none());
        assert_eq!(body["messages"][3]["role"], "user");
        assert_eq!(body["messages"][3]["content"], "Execution result: 5");
        assert_eq!(body["messages"][2]["role"], "assistant");
    }

    #[test]
    fn test_parse_completion() {
        let text = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"hello"}}]}"#;
        assert_eq!(parse_completion(text).unwrap(), "hello");
        assert!(matches!(parse_completion(""), Err(TransportError::EmptyResponse)));
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(TransportError::EmptyResponse)
        ));
        assert!(matches!(parse_completion("oops"), Err(TransportError::Parse(_))));
    }
}
