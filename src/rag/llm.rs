//! Answer generation backends.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{Config, LlmProvider, DEFAULT_MODEL};
use crate::integrations::{GeminiClient, GroqClient};

/// Completion backend used for the final prompt.
pub enum LlmClient {
    Gemini(GeminiClient),
    /// Groq, with an optional Gemini client used when Groq fails
    Groq {
        client: GroqClient,
        fallback: Option<GeminiClient>,
    },
}

impl LlmClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.effective_llm_provider() {
            LlmProvider::Gemini => {
                let key = config.require_google_key()?;
                let model = if config.llm_provider == LlmProvider::Groq
                    && !config.model.starts_with("gemini")
                {
                    // Downgraded from Groq: its model name means nothing to Gemini
                    warn!(model = %config.model, "Using {} instead", DEFAULT_MODEL);
                    DEFAULT_MODEL
                } else {
                    config.model.as_str()
                };
                let client =
                    GeminiClient::new(key, model)?.with_generation(config.generation.clone());
                Ok(LlmClient::Gemini(client))
            }
            LlmProvider::Groq => {
                let key = config
                    .groq_api_key
                    .as_deref()
                    .context("GROQ_API_KEY is required for the Groq provider")?;
                let client =
                    GroqClient::new(key, &config.model)?.with_generation(config.generation.clone());
                let fallback = match config.google_api_key.as_deref() {
                    Some(google) => Some(
                        GeminiClient::new(google, &config.fallback_model)?
                            .with_generation(config.generation.clone()),
                    ),
                    None => None,
                };
                Ok(LlmClient::Groq { client, fallback })
            }
        }
    }

    /// `provider/model` label for logs and the UI.
    pub fn describe(&self) -> String {
        match self {
            LlmClient::Gemini(client) => format!("gemini/{}", client.model()),
            LlmClient::Groq { client, .. } => format!("groq/{}", client.model()),
        }
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        match self {
            LlmClient::Gemini(client) => Ok(client.generate(prompt).await?),
            LlmClient::Groq { client, fallback } => match client.generate(prompt).await {
                Ok(answer) => Ok(answer),
                Err(groq_err) => match fallback {
                    Some(gemini) => {
                        warn!("Groq failed ({}), falling back to {}", groq_err, gemini.model());
                        let answer = gemini.generate(prompt).await.with_context(|| {
                            format!("Groq failed ({}) and Gemini fallback failed", groq_err)
                        })?;
                        info!("Answer generated by fallback model");
                        Ok(answer)
                    }
                    None => Err(groq_err.into()),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{EnvGuard, ENV_LOCK};
    use httpmock::prelude::*;
    use serde_json::json;

    async fn gemini_ok(server: &MockServer, model: &str) -> GeminiClient {
        let path = format!("/models/{}:generateContent", model);
        server
            .mock_async(|when, then| {
                when.method(POST).path(path);
                then.status(200).json_body(json!({
                    "candidates": [{"content": {"parts": [{"text": "from gemini"}]}}]
                }));
            })
            .await;
        GeminiClient::new("g-key", model)
            .unwrap()
            .with_base_url(&server.base_url())
    }

    #[tokio::test]
    async fn groq_failure_uses_gemini_fallback() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("groq down");
            })
            .await;
        let fallback = gemini_ok(&server, "gemini-2.5-pro").await;

        let llm = LlmClient::Groq {
            client: GroqClient::new("gsk", "llama-3.3-70b-versatile")
                .unwrap()
                .with_base_url(&server.base_url()),
            fallback: Some(fallback),
        };

        assert_eq!(llm.generate("prompt").await.unwrap(), "from gemini");
        assert_eq!(llm.describe(), "groq/llama-3.3-70b-versatile");
    }

    #[tokio::test]
    async fn groq_failure_without_fallback_is_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("groq down");
            })
            .await;

        let llm = LlmClient::Groq {
            client: GroqClient::new("gsk", "llama-3.3-70b-versatile")
                .unwrap()
                .with_base_url(&server.base_url()),
            fallback: None,
        };

        let err = llm.generate("prompt").await.unwrap_err();
        assert!(err.to_string().contains("groq down"));
    }

    fn load_yaml_config(yaml: &str) -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, yaml).unwrap();
        Config::load_from_file(&path).unwrap()
    }

    #[test]
    fn groq_without_key_builds_gemini_with_gemini_model() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _env: Vec<EnvGuard> = ["GROQ_API_KEY", "MODEL_NAME", "LLM_PROVIDER"]
            .iter()
            .map(|k| EnvGuard::remove(k))
            .collect();
        let _google = EnvGuard::set("GOOGLE_API_KEY", "g-key");
        let _provider = EnvGuard::set("LLM_PROVIDER", "groq");

        let config = load_yaml_config("prompt: concise\n");
        let llm = LlmClient::from_config(&config).unwrap();
        assert_eq!(llm.describe(), "gemini/gemini-2.0-flash");

        let config = load_yaml_config("llm:\n  model: llama-3.1-8b-instant\n");
        let llm = LlmClient::from_config(&config).unwrap();
        assert_eq!(llm.describe(), "gemini/gemini-2.0-flash");
    }

    #[test]
    fn groq_with_key_keeps_groq_model_and_fallback() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _env: Vec<EnvGuard> = ["MODEL_NAME", "LLM_PROVIDER"]
            .iter()
            .map(|k| EnvGuard::remove(k))
            .collect();
        let _google = EnvGuard::set("GOOGLE_API_KEY", "g-key");
        let _groq = EnvGuard::set("GROQ_API_KEY", "gsk-test");
        let _provider = EnvGuard::set("LLM_PROVIDER", "groq");

        let config = load_yaml_config("prompt: concise\n");
        match LlmClient::from_config(&config).unwrap() {
            LlmClient::Groq { client, fallback } => {
                assert_eq!(client.model(), "llama-3.3-70b-versatile");
                assert_eq!(fallback.unwrap().model(), "gemini-2.5-pro");
            }
            LlmClient::Gemini(_) => panic!("expected the Groq backend"),
        }
    }

    #[tokio::test]
    async fn gemini_backend_generates() {
        let server = MockServer::start_async().await;
        let llm = LlmClient::Gemini(gemini_ok(&server, "gemini-2.0-flash").await);
        assert_eq!(llm.generate("prompt").await.unwrap(), "from gemini");
        assert_eq!(llm.describe(), "gemini/gemini-2.0-flash");
    }
}
