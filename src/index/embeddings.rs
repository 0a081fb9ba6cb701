//! Embedding generation for chunks and queries.
//!
//! Three backends: Gemini (default, task-typed document/query embeddings),
//! OpenAI via `async-openai`, and a deterministic local hashing embedder for
//! offline runs and tests.

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client as OpenAIClient,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::config::{Config, EmbeddingProvider};
use crate::integrations::{GeminiClient, TaskType};

pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const LOCAL_EMBEDDING_DIM: usize = 256;
/// Embedding requests in flight during indexing.
const PARALLEL_BATCHES: usize = 4;

/// OpenAI embeddings through `async-openai`.
pub struct OpenAiEmbedder {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        Self::with_config(OpenAIConfig::new().with_api_key(api_key), model)
    }

    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: OpenAIClient::with_config(config),
            model: model.into(),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(texts.to_vec()))
            .build()?;

        let response = self.client.embeddings().create(request).await?;
        debug!(
            "OpenAI returned {} embeddings, tokens used: {}",
            response.data.len(),
            response.usage.total_tokens
        );

        let mut data = response.data;
        data.sort_by_key(|e| e.index);
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }
}

/// Deterministic, fast embedding for offline/local use.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dim: usize,
}

impl LocalEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut vec = vec![0.0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dim;
            vec[idx] += 1.0;
        }

        normalize(&mut vec);
        vec
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }
}

enum EmbedBackend {
    Gemini(GeminiClient),
    OpenAi(OpenAiEmbedder),
    Local(LocalEmbedder),
}

/// Embedding service with batching.
pub struct EmbeddingService {
    backend: EmbedBackend,
    batch_size: usize,
}

impl EmbeddingService {
    pub fn gemini(client: GeminiClient) -> Self {
        Self {
            backend: EmbedBackend::Gemini(client),
            batch_size: crate::config::DEFAULT_EMBEDDING_BATCH,
        }
    }

    pub fn openai(embedder: OpenAiEmbedder) -> Self {
        Self {
            backend: EmbedBackend::OpenAi(embedder),
            batch_size: crate::config::DEFAULT_EMBEDDING_BATCH,
        }
    }

    /// Create service with forced local embeddings (useful for tests or offline).
    pub fn local(dim: usize) -> Self {
        Self {
            backend: EmbedBackend::Local(LocalEmbedder::new(dim)),
            batch_size: crate::config::DEFAULT_EMBEDDING_BATCH,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Build the backend selected in the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = &config.index;
        let service = match settings.embedding_provider {
            EmbeddingProvider::Gemini => {
                let key = config.require_google_key()?;
                let client = GeminiClient::new(key, &config.model)?
                    .with_embedding_model(&settings.embedding_model);
                info!(model = %settings.embedding_model, "Using Gemini embeddings");
                Self::gemini(client)
            }
            EmbeddingProvider::OpenAi => {
                let key = config
                    .openai_api_key
                    .as_deref()
                    .context("OPENAI_API_KEY is required for OpenAI embeddings")?;
                let model = if settings.embedding_model.starts_with("text-embedding-00") {
                    DEFAULT_OPENAI_EMBEDDING_MODEL.to_string()
                } else {
                    settings.embedding_model.clone()
                };
                info!(%model, "Using OpenAI embeddings");
                Self::openai(OpenAiEmbedder::new(key, model))
            }
            EmbeddingProvider::Local => {
                info!("Using local hashing embeddings");
                Self::local(LOCAL_EMBEDDING_DIM)
            }
        };
        Ok(service.with_batch_size(settings.embedding_batch_size))
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            EmbedBackend::Gemini(_) => "gemini",
            EmbedBackend::OpenAi(_) => "openai",
            EmbedBackend::Local(_) => "local",
        }
    }

    /// Embed chunk texts in batches; output order matches input order.
    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(self.batch_size).enumerate())
            .map(|(batch_number, batch)| self.embed_batch(batch_number, batch))
            .buffered(PARALLEL_BATCHES)
            .try_collect()
            .await?;
        Ok(batches.into_iter().flatten().collect())
    }

    async fn embed_batch(&self, batch_number: usize, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!(batch = batch_number, size = batch.len(), "Embedding batch");
        let vectors = match &self.backend {
            EmbedBackend::Gemini(client) => client
                .embed_batch(batch, TaskType::RetrievalDocument)
                .await
                .with_context(|| format!("Gemini embedding batch {} failed", batch_number))?,
            EmbedBackend::OpenAi(embedder) => embedder
                .embed_batch(batch)
                .await
                .with_context(|| format!("OpenAI embedding batch {} failed", batch_number))?,
            EmbedBackend::Local(local) => batch.iter().map(|t| local.embed(t)).collect(),
        };
        anyhow::ensure!(
            vectors.len() == batch.len(),
            "embedding backend returned {} vectors for {} texts",
            vectors.len(),
            batch.len()
        );
        Ok(vectors)
    }

    /// Embed a user question.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        match &self.backend {
            EmbedBackend::Gemini(client) => Ok(client
                .embed(text, TaskType::RetrievalQuery)
                .await
                .context("Gemini query embedding failed")?),
            EmbedBackend::OpenAi(embedder) => embedder
                .embed_batch(&[text.to_string()])
                .await?
                .into_iter()
                .next()
                .context("No embedding returned"),
            EmbedBackend::Local(local) => Ok(local.embed(text)),
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

pub fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn cosine_similarity_handles_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);

        let aligned = cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]);
        assert!((aligned - 1.0).abs() < 1e-6);

        let orthogonal = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(orthogonal.abs() < 1e-6);
    }

    #[test]
    fn normalize_scales_vector_to_unit_length() {
        let mut vec = vec![3.0, 4.0];
        normalize(&mut vec);
        let norm = (vec[0].powi(2) + vec[1].powi(2)).sqrt();

        assert!((norm - 1.0).abs() < 1e-6);
        assert!(vec[1] > vec[0]);
    }

    #[test]
    fn local_embedder_is_deterministic_and_case_insensitive() {
        let embedder = LocalEmbedder::new(64);
        let a = embedder.embed("Job Worker");
        let b = embedder.embed("job worker!");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(LocalEmbedder::new(2).dimension(), 8);
    }

    #[tokio::test]
    async fn local_documents_keep_order_across_batches() {
        let service = EmbeddingService::local(32).with_batch_size(2);
        let texts: Vec<String> = ["zeebe", "operate", "tasklist", "optimize", "connectors"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let vectors = service.embed_documents(&texts).await.unwrap();
        assert_eq!(vectors.len(), 5);
        for (text, vector) in texts.iter().zip(&vectors) {
            assert_eq!(vector, &service.embed_query(text).await.unwrap());
        }
        assert!(service.embed_documents(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn gemini_backend_batches_requests() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/text-embedding-004:batchEmbedContents")
                    .json_body_includes(r#"{"requests":[{"taskType":"RETRIEVAL_DOCUMENT"}]}"#);
                then.status(200)
                    .json_body(json!({"embeddings": [{"values": [1.0, 0.0]}]}));
            })
            .await;

        let client = GeminiClient::new("test-key", "gemini-2.0-flash")
            .unwrap()
            .with_base_url(&server.base_url());
        let service = EmbeddingService::gemini(client).with_batch_size(1);

        let texts = vec!["first".to_string(), "second".to_string()];
        let vectors = service.embed_documents(&texts).await.unwrap();

        mock.assert_hits_async(2).await;
        assert_eq!(vectors.len(), 2);
        assert_eq!(service.backend_name(), "gemini");
    }

    #[tokio::test]
    async fn openai_backend_sorts_by_index() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "object": "list",
                    "model": "text-embedding-3-small",
                    "data": [
                        {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                        {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
                    ],
                    "usage": {"prompt_tokens": 2, "total_tokens": 2}
                }));
            })
            .await;

        let config = OpenAIConfig::new()
            .with_api_key("sk-test")
            .with_api_base(server.base_url());
        let service = EmbeddingService::openai(OpenAiEmbedder::with_config(
            config,
            DEFAULT_OPENAI_EMBEDDING_MODEL,
        ));

        let texts = vec!["a".to_string(), "b".to_string()];
        let vectors = service.embed_documents(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }
}
