//! Configuration for the migration assistant
//!
//! Loads configuration from config.yml, with environment variables (and `.env`)
//! taking precedence over file values.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};
use crate::prompts::Prompt;

/// Default constants (fallback if config.yml not found)
pub const CONFIG_FILE: &str = "config.yml";
pub const DEFAULT_DOCS_DIR: &str = "documentacao_migracao_camunda";
pub const DEFAULT_INDEX_DIR: &str = "vector_index";
pub const DEFAULT_IMAGES_DIR: &str = "extracted_images";
pub const DEFAULT_IMAGE_METADATA: &str = "image_metadata.json";
pub const DEFAULT_COLLECTION: &str = "camunda_migration";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_RERANK_MODEL: &str = "rerank-multilingual-v3.0";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_RETRIEVAL_TOP_K: usize = 50;
pub const DEFAULT_RERANK_TOP_N: usize = 5;
pub const DEFAULT_MAX_SOURCES: usize = 5;
pub const DEFAULT_EMBEDDING_BATCH: usize = 100;

/// Which completion API answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    Groq,
}

impl LlmProvider {
    /// Unknown values fall back to Gemini.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "groq" => LlmProvider::Groq,
            _ => LlmProvider::Gemini,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::Groq => "groq",
        }
    }
}

/// Which API produces chunk and query embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    Gemini,
    OpenAi,
    /// Deterministic hashing embedder, no network.
    Local,
}

impl EmbeddingProvider {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "openai" => EmbeddingProvider::OpenAi,
            "local" | "offline" => EmbeddingProvider::Local,
            _ => EmbeddingProvider::Gemini,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingProvider::Gemini => "gemini",
            EmbeddingProvider::OpenAi => "openai",
            EmbeddingProvider::Local => "local",
        }
    }
}

/// Where chunk vectors live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    /// JSON index persisted under `index_dir`
    Local,
    Qdrant,
}

impl VectorBackend {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "qdrant" => VectorBackend::Qdrant,
            _ => VectorBackend::Local,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VectorBackend::Local => "local",
            VectorBackend::Qdrant => "qdrant",
        }
    }
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 500,
        }
    }
}

/// Retrieve-then-rerank sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct RagSettings {
    pub retrieval_top_k: usize,
    pub rerank_top_n: usize,
    pub max_sources: usize,
    pub rerank_model: String,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            retrieval_top_k: DEFAULT_RETRIEVAL_TOP_K,
            rerank_top_n: DEFAULT_RERANK_TOP_N,
            max_sources: DEFAULT_MAX_SOURCES,
            rerank_model: DEFAULT_RERANK_MODEL.to_string(),
        }
    }
}

/// Ingestion and storage layout.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSettings {
    pub docs_dir: PathBuf,
    pub index_dir: PathBuf,
    pub images_dir: PathBuf,
    pub image_metadata: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub collection: String,
    pub embedding_provider: EmbeddingProvider,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
    pub backend: VectorBackend,
    pub qdrant_url: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from(DEFAULT_DOCS_DIR),
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            images_dir: PathBuf::from(DEFAULT_IMAGES_DIR),
            image_metadata: PathBuf::from(DEFAULT_IMAGE_METADATA),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            collection: DEFAULT_COLLECTION.to_string(),
            embedding_provider: EmbeddingProvider::Gemini,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH,
            backend: VectorBackend::Local,
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
        }
    }
}

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    api_keys: Option<ApiKeysConfig>,
    llm: Option<LlmConfig>,
    generation: Option<GenerationConfig>,
    rag: Option<RagConfig>,
    indexing: Option<IndexingConfig>,
    vector_store: Option<VectorStoreConfig>,
    prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiKeysConfig {
    google: Option<String>,
    cohere: Option<String>,
    groq: Option<String>,
    openai: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmConfig {
    provider: Option<String>,
    model: Option<String>,
    fallback_model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerationConfig {
    temperature: Option<f32>,
    top_p: Option<f32>,
    top_k: Option<u32>,
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RagConfig {
    retrieval_top_k: Option<usize>,
    rerank_top_n: Option<usize>,
    max_sources: Option<usize>,
    rerank_model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IndexingConfig {
    docs_dir: Option<PathBuf>,
    index_dir: Option<PathBuf>,
    images_dir: Option<PathBuf>,
    image_metadata: Option<PathBuf>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    collection: Option<String>,
    embedding_provider: Option<String>,
    embedding_model: Option<String>,
    embedding_batch_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct VectorStoreConfig {
    backend: Option<String>,
    qdrant_url: Option<String>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: Option<String>,
    pub cohere_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub llm_provider: LlmProvider,
    pub model: String,
    pub fallback_model: String,
    pub generation: GenerationSettings,
    pub rag: RagSettings,
    pub index: IndexSettings,
    pub prompt: Prompt,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    /// Environment variables take precedence over config.yml values
    pub fn new() -> Self {
        Self::load_from_file(CONFIG_FILE)
            .or_else(|_| Self::load_from_file(Path::new("..").join(CONFIG_FILE)))
            .unwrap_or_else(|_| Self::defaults())
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> Option<String> {
        if let Some(ref v) = value {
            if v.starts_with("${") && v.ends_with('}') {
                let var_name = &v[2..v.len() - 1];
                if let Ok(env_val) = std::env::var(var_name) {
                    return non_empty(env_val);
                }
                return std::env::var(env_key).ok().and_then(non_empty);
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            if let Some(env_val) = non_empty(env_val) {
                return Some(env_val);
            }
        }
        value.and_then(non_empty)
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)?;
        Ok(Self::from_yaml(yaml))
    }

    /// Defaults plus whatever the environment provides.
    fn defaults() -> Self {
        Self::load_dotenv();
        Self::from_yaml(YamlConfig::default())
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let keys = yaml.api_keys.unwrap_or_default();
        let llm = yaml.llm.unwrap_or_default();
        let generation = yaml.generation.unwrap_or_default();
        let rag = yaml.rag.unwrap_or_default();
        let indexing = yaml.indexing.unwrap_or_default();
        let vector_store = yaml.vector_store.unwrap_or_default();

        let gen_defaults = GenerationSettings::default();
        let rag_defaults = RagSettings::default();
        let index_defaults = IndexSettings::default();

        let llm_provider = Self::resolve_env_string(llm.provider, "LLM_PROVIDER")
            .map(|p| LlmProvider::parse(&p))
            .unwrap_or(LlmProvider::Gemini);

        let groq_api_key = Self::resolve_env_string(keys.groq, "GROQ_API_KEY");

        // Default model follows the provider that will actually answer
        let model = Self::resolve_env_string(llm.model, "MODEL_NAME").unwrap_or_else(|| {
            match (llm_provider, groq_api_key.is_some()) {
                (LlmProvider::Groq, true) => DEFAULT_GROQ_MODEL.to_string(),
                _ => DEFAULT_MODEL.to_string(),
            }
        });

        Self {
            google_api_key: Self::resolve_env_string(keys.google, "GOOGLE_API_KEY"),
            cohere_api_key: Self::resolve_env_string(keys.cohere, "COHERE_API_KEY"),
            groq_api_key,
            openai_api_key: Self::resolve_env_string(keys.openai, "OPENAI_API_KEY"),
            llm_provider,
            model,
            fallback_model: llm
                .fallback_model
                .unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string()),
            generation: GenerationSettings {
                temperature: generation.temperature.unwrap_or(gen_defaults.temperature),
                top_p: generation.top_p.unwrap_or(gen_defaults.top_p),
                top_k: generation.top_k.unwrap_or(gen_defaults.top_k),
                max_output_tokens: generation
                    .max_output_tokens
                    .unwrap_or(gen_defaults.max_output_tokens),
            },
            rag: RagSettings {
                retrieval_top_k: rag.retrieval_top_k.unwrap_or(rag_defaults.retrieval_top_k),
                rerank_top_n: rag.rerank_top_n.unwrap_or(rag_defaults.rerank_top_n),
                max_sources: rag.max_sources.unwrap_or(rag_defaults.max_sources),
                rerank_model: rag.rerank_model.unwrap_or(rag_defaults.rerank_model),
            },
            index: IndexSettings {
                docs_dir: indexing.docs_dir.unwrap_or(index_defaults.docs_dir),
                index_dir: indexing.index_dir.unwrap_or(index_defaults.index_dir),
                images_dir: indexing.images_dir.unwrap_or(index_defaults.images_dir),
                image_metadata: indexing
                    .image_metadata
                    .unwrap_or(index_defaults.image_metadata),
                chunk_size: indexing.chunk_size.unwrap_or(index_defaults.chunk_size),
                chunk_overlap: indexing
                    .chunk_overlap
                    .unwrap_or(index_defaults.chunk_overlap),
                collection: indexing.collection.unwrap_or(index_defaults.collection),
                embedding_provider: indexing
                    .embedding_provider
                    .map(|p| EmbeddingProvider::parse(&p))
                    .unwrap_or(index_defaults.embedding_provider),
                embedding_model: indexing
                    .embedding_model
                    .unwrap_or(index_defaults.embedding_model),
                embedding_batch_size: indexing
                    .embedding_batch_size
                    .unwrap_or(index_defaults.embedding_batch_size),
                backend: vector_store
                    .backend
                    .map(|b| VectorBackend::parse(&b))
                    .unwrap_or(index_defaults.backend),
                qdrant_url: Self::resolve_env_string(vector_store.qdrant_url, "QDRANT_URL")
                    .unwrap_or(index_defaults.qdrant_url),
            },
            prompt: yaml
                .prompt
                .map(|p| Prompt::parse(&p))
                .unwrap_or(Prompt::Concise),
        }
    }

    /// Check numeric settings for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.index.chunk_size == 0 {
            return Err(Error::ConfigError(
                "indexing.chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.index.chunk_overlap >= self.index.chunk_size {
            return Err(Error::ConfigError(
                "indexing.chunk_overlap must be less than chunk_size".to_string(),
            ));
        }
        if self.index.embedding_batch_size == 0 {
            return Err(Error::ConfigError(
                "indexing.embedding_batch_size must be greater than 0".to_string(),
            ));
        }
        if self.rag.retrieval_top_k == 0 || self.rag.rerank_top_n == 0 {
            return Err(Error::ConfigError(
                "rag.retrieval_top_k and rag.rerank_top_n must be greater than 0".to_string(),
            ));
        }
        if self.rag.rerank_top_n > self.rag.retrieval_top_k {
            return Err(Error::ConfigError(format!(
                "rag.rerank_top_n ({}) cannot exceed rag.retrieval_top_k ({})",
                self.rag.rerank_top_n, self.rag.retrieval_top_k
            )));
        }
        Ok(())
    }

    /// Google key or a helpful error.
    pub fn require_google_key(&self) -> Result<&str> {
        self.google_api_key
            .as_deref()
            .ok_or_else(|| Error::MissingApiKey("GOOGLE_API_KEY".to_string()))
    }

    /// Provider that will actually answer: Groq without a key degrades to Gemini.
    pub fn effective_llm_provider(&self) -> LlmProvider {
        if self.llm_provider == LlmProvider::Groq && self.groq_api_key.is_none() {
            warn!("LLM provider 'groq' selected but GROQ_API_KEY is missing; using Gemini");
            return LlmProvider::Gemini;
        }
        self.llm_provider
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
