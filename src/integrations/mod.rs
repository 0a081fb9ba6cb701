//! External integrations module.
//!
//! Provides clients for:
//! - Google Gemini (generation, embeddings, model listing)
//! - Groq (OpenAI-compatible chat completions)
//! - Cohere (rerank)

use std::time::Duration;

use reqwest::Client;

pub mod cohere;
pub mod gemini;
pub mod groq;

pub use cohere::{CohereClient, RerankResult};
pub use gemini::{GeminiClient, ModelInfo, TaskType};
pub use groq::GroqClient;

/// Build the shared reqwest client. Every request gives up after `timeout`.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!("migration_assistant/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()
}
