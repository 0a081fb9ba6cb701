//! Camunda 7 → 8 Migration Assistant Library
//!
//! This library provides tools to:
//! - Extract text, sections and images from migration guide PDFs
//! - Chunk, embed and index them (local JSON index or Qdrant)
//! - Answer developer questions with retrieval, reranking and an LLM
//! - Serve the assistant from a terminal loop or a small web chat UI

pub mod config;
pub mod error;
pub mod index;
pub mod integrations;
pub mod lock;
pub mod metrics;
pub mod pdf;
pub mod prompts;
pub mod rag;

// Re-export common types
pub use config::Config;
pub use error::{Error, Result};
pub use integrations::{CohereClient, GeminiClient, GroqClient};
pub use prompts::{load_prompt, Prompt};
pub use rag::{Answer, AnswerStatus, Assistant};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
