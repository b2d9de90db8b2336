use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::client::{GenerationClient, GenerationError};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Client speaking the OpenAI-compatible chat completions protocol.
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl HttpGenerationClient {
    /// Creates a client for the default endpoint and model.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_ENDPOINT.into(),
            model: DEFAULT_MODEL.into(),
            api_key: api_key.into(),
            temperature: 0.0,
        }
    }

    /// Builds a client from `OPENAI_API_KEY` (+ optional `LLM_ENDPOINT`,
    /// `LLM_MODEL`) environment variables.
    pub fn from_env() -> Result<Self, GenerationError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| GenerationError::Provider("OPENAI_API_KEY is not set".into()))?;
        let mut client = Self::new(api_key);
        if let Ok(endpoint) = std::env::var("LLM_ENDPOINT") {
            client.endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            client.model = model;
        }
        Ok(client)
    }

    /// Overrides the chat endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Overrides the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| GenerationError::Provider(err.to_string()))?;
        if !response.status().is_success() {
            return Err(GenerationError::Provider(format!(
                "unexpected status {}",
                response.status()
            )));
        }
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::Provider(err.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Provider("empty choices array".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_apply() {
        let client = HttpGenerationClient::new("key")
            .with_endpoint("http://localhost:9000/v1/chat/completions")
            .with_model("local-model");
        assert_eq!(client.model, "local-model");
        assert!(client.endpoint.starts_with("http://localhost"));
    }

    #[test]
    fn response_shape_deserializes() {
        let body = r#"{"choices":[{"message":{"content":"hello"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "hello");
    }
}
