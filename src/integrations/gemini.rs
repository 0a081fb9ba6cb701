//! Google Gemini API client.
//!
//! Covers the three endpoints the assistant needs:
//! - `generateContent` for answers
//! - `embedContent` / `batchEmbedContents` for retrieval embeddings
//! - `models` listing for the `models` command

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http_client;
use crate::config::{GenerationSettings, DEFAULT_EMBEDDING_MODEL};
use crate::{Error, Result};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
/// Generation with large contexts can take a while on the Pro models.
pub const GEMINI_TIMEOUT: Duration = Duration::from_secs(120);

/// Embedding task hint sent with every embedding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

/// Google Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    pub(crate) base_url: String,
    model: String,
    embedding_model: String,
    generation: GenerationSettings,
}

impl GeminiClient {
    /// Create a client with an API key and generation model.
    pub fn new<S: Into<String>>(api_key: S, model: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey("GOOGLE_API_KEY is empty".to_string()));
        }

        let http = http_client(GEMINI_TIMEOUT)
            .map_err(|e| Error::GeminiError(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: GEMINI_API_URL.to_string(),
            model: model.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation: GenerationSettings::default(),
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = model.to_string();
        self
    }

    pub fn with_generation(mut self, generation: GenerationSettings) -> Self {
        self.generation = generation;
        self
    }

    /// Replace the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = http_client(timeout)
            .map_err(|e| Error::GeminiError(format!("HTTP client error: {}", e)))?;
        Ok(self)
    }

    /// Point the client at another API root (used by tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Strip an optional `models/` prefix so both forms are accepted.
    fn model_path(model: &str) -> &str {
        model.strip_prefix("models/").unwrap_or(model)
    }

    /// Transport errors end up in user-visible answers, so the URL is dropped.
    fn request_failed(err: reqwest::Error) -> Error {
        let kind = if err.is_timeout() { "timed out" } else { "failed" };
        Error::GeminiError(format!("request {}: {}", kind, err.without_url()))
    }

    async fn post_json<T: Serialize>(&self, method: &str, model: &str, payload: &T) -> Result<String> {
        let url = format!("{}/models/{}:{}", self.base_url, Self::model_path(model), method);

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(Self::request_failed)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::GeminiError(format!("failed to read response: {}", e.without_url())))?;

        if !status.is_success() {
            return Err(Error::GeminiError(format!("{} {}: {}", method, status, text)));
        }

        Ok(text)
    }

    /// Generate an answer for a single user prompt.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let payload = GeminiRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig::from(&self.generation),
        };

        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Gemini generateContent");
        let text = self.post_json("generateContent", &self.model, &payload).await?;

        let gemini_response: GeminiResponse = serde_json::from_str(&text).map_err(|e| {
            Error::GeminiError(format!("invalid generateContent response: {} - {}", e, text))
        })?;

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::GeminiError("empty response from Gemini".to_string()))?;

        let answer: String = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if answer.trim().is_empty() {
            return Err(Error::GeminiError(format!(
                "no text in response (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(answer)
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str, task_type: TaskType) -> Result<Vec<f32>> {
        let payload = EmbedRequest {
            model: format!("models/{}", Self::model_path(&self.embedding_model)),
            content: Content {
                role: None,
                parts: vec![Part {
                    text: Some(text.to_string()),
                }],
            },
            task_type,
        };

        let body = self
            .post_json("embedContent", &self.embedding_model, &payload)
            .await?;
        let response: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| Error::GeminiError(format!("invalid embedContent response: {}", e)))?;

        Ok(response.embedding.values)
    }

    /// Embed several texts in one request; output order matches input order.
    pub async fn embed_batch(&self, texts: &[String], task_type: TaskType) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = format!("models/{}", Self::model_path(&self.embedding_model));
        let payload = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: model.clone(),
                    content: Content {
                        role: None,
                        parts: vec![Part {
                            text: Some(text.clone()),
                        }],
                    },
                    task_type,
                })
                .collect(),
        };

        let body = self
            .post_json("batchEmbedContents", &self.embedding_model, &payload)
            .await?;
        let response: BatchEmbedResponse = serde_json::from_str(&body).map_err(|e| {
            Error::GeminiError(format!("invalid batchEmbedContents response: {}", e))
        })?;

        if response.embeddings.len() != texts.len() {
            return Err(Error::GeminiError(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }

    /// List models that support `generateContent`, following pagination.
    pub async fn list_generation_models(&self) -> Result<Vec<ModelInfo>> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!("{}/models?pageSize=100", self.base_url);
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(token);
            }

            let response = self
                .http
                .get(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .send()
                .await
                .map_err(Self::request_failed)?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| Error::GeminiError(format!("failed to read response: {}", e.without_url())))?;

            if !status.is_success() {
                return Err(Error::GeminiError(format!("models {}: {}", status, text)));
            }

            let page: ListModelsResponse = serde_json::from_str(&text)
                .map_err(|e| Error::GeminiError(format!("invalid models response: {}", e)))?;

            models.extend(page.models.into_iter().filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(models)
    }
}

// === Request structures ===

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl From<&GenerationSettings> for GenerationConfig {
    fn from(settings: &GenerationSettings) -> Self {
        Self {
            temperature: settings.temperature,
            top_p: settings.top_p,
            top_k: settings.top_k,
            max_output_tokens: settings.max_output_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    model: String,
    content: Content,
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

// === Response structures ===

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

/// A model entry from the `models` listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}
