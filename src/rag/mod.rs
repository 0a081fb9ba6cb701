//! Retrieval-augmented answering over the migration index.

pub mod assistant;
pub mod context;
pub mod llm;
pub mod rerank;

pub use assistant::{Answer, AnswerStatus, Assistant, NO_DOCUMENTS_MESSAGE};
pub use context::{group_images_by_document, Source, MAX_IMAGES_PER_DOCUMENT};
pub use llm::LlmClient;
pub use rerank::Reranker;
