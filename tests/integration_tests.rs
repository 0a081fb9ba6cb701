//! Integration tests for migration_assistant library
//!
//! These tests verify the public API and module interactions.

mod pipeline;

use migration_assistant::{
    config::{Config, EmbeddingProvider, LlmProvider, VectorBackend},
    error::Error,
    index::{cosine_similarity, Chunker, LocalEmbedder},
    pdf::Section,
    prompts::{list_prompts, Prompt},
    rag::{group_images_by_document, MAX_IMAGES_PER_DOCUMENT},
};
use tempfile::tempdir;

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_file_overrides_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(
        &path,
        r#"
llm:
  provider: gemini
  model: gemini-2.5-flash
rag:
  retrieval_top_k: 20
  rerank_top_n: 3
indexing:
  chunk_size: 500
  chunk_overlap: 50
  embedding_provider: local
vector_store:
  backend: qdrant
prompt: detailed
"#,
    )
    .unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.rag.retrieval_top_k, 20);
    assert_eq!(config.rag.rerank_top_n, 3);
    assert_eq!(config.index.chunk_size, 500);
    assert_eq!(config.index.embedding_provider, EmbeddingProvider::Local);
    assert_eq!(config.index.backend, VectorBackend::Qdrant);
    assert_eq!(config.prompt, Prompt::Detailed);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_invalid_overlap_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(&path, "indexing:\n  chunk_size: 100\n  chunk_overlap: 100\n").unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
}

#[test]
fn test_provider_names_round_trip() {
    assert_eq!(LlmProvider::parse(LlmProvider::Groq.as_str()), LlmProvider::Groq);
    assert_eq!(
        EmbeddingProvider::parse(EmbeddingProvider::OpenAi.as_str()),
        EmbeddingProvider::OpenAi
    );
    assert_eq!(VectorBackend::parse(VectorBackend::Qdrant.as_str()), VectorBackend::Qdrant);
}

// ============================================================================
// Prompt Tests
// ============================================================================

#[test]
fn test_builtin_prompts_available() {
    let prompts = list_prompts();
    assert!(prompts.contains(&Prompt::Concise));
    assert!(prompts.contains(&Prompt::Detailed));
    assert!(!Prompt::Concise.load_or_builtin().trim().is_empty());
    assert!(!Prompt::Detailed.load_or_builtin().trim().is_empty());
}

// ============================================================================
// Chunking & Similarity Tests
// ============================================================================

#[test]
fn test_chunker_respects_size_and_overlap() {
    let text = "Camunda 8 uses Zeebe as its workflow engine. ".repeat(60);
    let chunker = Chunker::new(200, 40);
    let chunks = chunker.split_text(&text);

    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.chars().count() <= 200));
}

#[test]
fn test_local_embeddings_rank_related_text_higher() {
    let embedder = LocalEmbedder::new(256);
    let query = embedder.embed("job worker for external tasks");
    let related = embedder.embed("external tasks become a job worker in Camunda 8");
    let unrelated = embedder.embed("history data copied by the data migrator");

    assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
}

// ============================================================================
// Section & Image Tests
// ============================================================================

#[test]
fn test_section_classification_defaults_to_general() {
    assert_eq!(Section::classify("lorem ipsum dolor"), Section::General);
}

#[test]
fn test_image_grouping_caps_each_document() {
    let dir = tempdir().unwrap();
    let paths: Vec<String> = (0..6)
        .map(|i| {
            let path = dir.path().join(format!("guide_p{}_img0.jpg", i + 1));
            std::fs::write(&path, b"jpg").unwrap();
            path.to_string_lossy().into_owned()
        })
        .collect();

    let groups = group_images_by_document(&paths);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].1.len(), MAX_IMAGES_PER_DOCUMENT);
}
