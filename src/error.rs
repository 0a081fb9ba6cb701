//! Error types for the migration assistant

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("API key not configured: {0}")]
    MissingApiKey(String),

    #[error("PDF error: {0}")]
    PdfError(String),

    #[error("Gemini API error: {0}")]
    GeminiError(String),

    #[error("Groq API error: {0}")]
    GroqError(String),

    #[error("Cohere API error: {0}")]
    CohereError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Vector store error: {0}")]
    VectorStoreError(String),

    #[error("Vector index not found at {0}; run `migration_assistant index` first")]
    IndexNotFound(String),

    #[error("Vector index is locked by another process")]
    IndexLocked,

    #[error("Failed to acquire index lock: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::PdfError(err.to_string())
    }
}
