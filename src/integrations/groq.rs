//! Groq API client (OpenAI-compatible chat completions).

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http_client;
use crate::config::GenerationSettings;
use crate::{Error, Result};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_TIMEOUT: Duration = Duration::from_secs(60);

/// Groq client.
#[derive(Debug, Clone)]
pub struct GroqClient {
    http: Client,
    api_key: String,
    pub(crate) base_url: String,
    model: String,
    generation: GenerationSettings,
}

impl GroqClient {
    /// Create client with API key and model.
    pub fn new<S: Into<String>>(api_key: S, model: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey("GROQ_API_KEY is empty".to_string()));
        }

        let http = http_client(GROQ_TIMEOUT)
            .map_err(|e| Error::GroqError(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: GROQ_API_URL.to_string(),
            model: model.to_string(),
            generation: GenerationSettings::default(),
        })
    }

    pub fn with_generation(mut self, generation: GenerationSettings) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = http_client(timeout)
            .map_err(|e| Error::GroqError(format!("HTTP client error: {}", e)))?;
        Ok(self)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send the prompt as a single user message.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            temperature: self.generation.temperature,
            max_tokens: self.generation.max_output_tokens,
            top_p: self.generation.top_p,
        };

        debug!(model = %self.model, "Groq chat completion");
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::GroqError(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::GroqError(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::GroqError(format!("{}: {}", status, text)));
        }

        let chat_response: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| Error::GroqError(format!("invalid response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::GroqError("empty response from Groq".to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_new_rejects_empty_key() {
        let err = GroqClient::new("", "llama-3.3-70b-versatile").unwrap_err();
        assert!(matches!(err, Error::MissingApiKey(_)));
    }

    #[tokio::test]
    async fn test_generate_sends_bearer_and_parameters() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("Authorization", "Bearer gsk-test")
                    .json_body_includes(r#"{"model":"llama-3.3-70b-versatile","max_tokens":500}"#);
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": "Zeebe is the engine."}}]
                }));
            })
            .await;

        let client = GroqClient::new("gsk-test", "llama-3.3-70b-versatile")
            .unwrap()
            .with_base_url(&server.base_url());
        let answer = client.generate("What is Zeebe?").await.unwrap();

        mock.assert_async().await;
        assert_eq!(answer, "Zeebe is the engine.");
    }

    #[tokio::test]
    async fn test_generate_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(503).body("over capacity");
            })
            .await;

        let client = GroqClient::new("gsk-test", "llama-3.3-70b-versatile")
            .unwrap()
            .with_base_url(&server.base_url());
        let err = client.generate("?").await.unwrap_err();
        assert!(matches!(err, Error::GroqError(_)));
        assert!(err.to_string().contains("over capacity"));
    }

    #[tokio::test]
    async fn test_generate_empty_choices_is_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({"choices": []}));
            })
            .await;

        let client = GroqClient::new("gsk-test", "llama-3.3-70b-versatile")
            .unwrap()
            .with_base_url(&server.base_url());
        assert!(client.generate("?").await.is_err());
    }

    #[tokio::test]
    async fn test_generate_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200)
                    .delay(Duration::from_secs(5))
                    .json_body(json!({"choices": []}));
            })
            .await;

        let client = GroqClient::new("gsk-test", "llama-3.3-70b-versatile")
            .unwrap()
            .with_base_url(&server.base_url())
            .with_timeout(Duration::from_millis(200))
            .unwrap();
        let err = client.generate("?").await.unwrap_err();
        assert!(matches!(err, Error::GroqError(_)));
        assert!(!err.to_string().contains("gsk-test"));
    }
}
