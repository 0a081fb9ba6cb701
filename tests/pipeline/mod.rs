//! End-to-end pipeline: PDFs → index → question → answer

mod fixtures;

use httpmock::prelude::*;
use migration_assistant::config::{IndexSettings, RagSettings, VectorBackend};
use migration_assistant::index::{EmbeddingService, Indexer, VectorStore};
use migration_assistant::integrations::{CohereClient, GeminiClient};
use migration_assistant::lock::IndexLock;
use migration_assistant::pdf::ImageCatalog;
use migration_assistant::rag::{AnswerStatus, Assistant, LlmClient, Reranker};
use migration_assistant::Error;
use serde_json::json;
use tempfile::{tempdir, TempDir};

const DIM: usize = 256;

fn settings(dir: &TempDir) -> IndexSettings {
    IndexSettings {
        docs_dir: dir.path().join("docs"),
        index_dir: dir.path().join("vector_index"),
        images_dir: dir.path().join("extracted_images"),
        image_metadata: dir.path().join("image_metadata.json"),
        backend: VectorBackend::Local,
        ..IndexSettings::default()
    }
}

fn write_docs(settings: &IndexSettings) {
    std::fs::create_dir_all(&settings.docs_dir).unwrap();
    fixtures::write_pdf(
        &settings.docs_dir.join("migration_guide.pdf"),
        &[
            (
                "Code conversion\nConvert every JavaDelegate into a job worker\nThe job worker completes the job",
                true,
            ),
            ("Migration Analyzer\nThe analyzer checks BPMN models before migration", false),
        ],
    );
    fixtures::write_pdf(
        &settings.docs_dir.join("data_migrator.pdf"),
        &[("Data Migrator\nCopies runtime process instances and history data", false)],
    );
}

#[tokio::test]
async fn index_then_ask_end_to_end() {
    let dir = tempdir().unwrap();
    let settings = settings(&dir);
    write_docs(&settings);

    let stats = Indexer::new(settings.clone(), EmbeddingService::local(DIM))
        .run()
        .await
        .unwrap();
    assert_eq!(stats.documents, 2);
    assert_eq!(stats.pages, 3);
    assert_eq!(stats.images, 1);
    assert!(stats.chunks >= 3);
    assert_eq!(stats.chunks_with_images, 1);

    let catalog = ImageCatalog::load(&settings.image_metadata).unwrap();
    assert_eq!(catalog.len(), 1);
    assert!(catalog.get("migration_guide_p1_img0.jpg").is_some());

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/rerank");
            then.status(200).json_body(json!({
                "results": [{"index": 0, "relevance_score": 0.93}]
            }));
        })
        .await;
    let generate = server
        .mock_async(|when, then| {
            when.method(POST).path("/models/gemini-2.0-flash:generateContent");
            then.status(200).json_body(json!({
                "candidates": [{"content": {"parts": [{"text": "Implement a job worker for each JavaDelegate."}]}}]
            }));
        })
        .await;

    let assistant = Assistant::new(
        VectorStore::open(&settings).await.unwrap(),
        EmbeddingService::local(DIM),
        Reranker::Cohere(
            CohereClient::new("co-key")
                .unwrap()
                .with_base_url(&server.base_url()),
        ),
        LlmClient::Gemini(
            GeminiClient::new("g-key", "gemini-2.0-flash")
                .unwrap()
                .with_base_url(&server.base_url()),
        ),
        "You are a migration assistant.".to_string(),
        RagSettings::default(),
    );

    let answer = assistant
        .ask("How do I convert a JavaDelegate into a job worker?")
        .await;

    generate.assert_async().await;
    assert_eq!(answer.status, AnswerStatus::Answered);
    assert_eq!(answer.answer, "Implement a job worker for each JavaDelegate.");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].document, "migration_guide");
    assert_eq!(answer.sources[0].page, 1);
    assert_eq!(answer.sources[0].relevance, "0.93");
    assert_eq!(answer.images.len(), 1);
    assert!(answer.images[0].ends_with("migration_guide_p1_img0.jpg"));
}

#[tokio::test]
async fn reindexing_replaces_previous_chunks() {
    let dir = tempdir().unwrap();
    let settings = settings(&dir);
    write_docs(&settings);

    let indexer = Indexer::new(settings.clone(), EmbeddingService::local(DIM));
    let first = indexer.run().await.unwrap();
    let second = indexer.run().await.unwrap();
    assert_eq!(first.chunks, second.chunks);

    let store = VectorStore::open(&settings).await.unwrap();
    assert_eq!(store.len().await.unwrap(), second.chunks);
}

#[tokio::test]
async fn indexing_fails_while_locked() {
    let dir = tempdir().unwrap();
    let settings = settings(&dir);
    write_docs(&settings);

    let _held = IndexLock::acquire(&settings.index_dir).unwrap();
    let err = Indexer::new(settings.clone(), EmbeddingService::local(DIM))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::IndexLocked)));
}

#[tokio::test]
async fn opening_missing_index_is_index_not_found() {
    let dir = tempdir().unwrap();
    let err = VectorStore::open(&settings(&dir)).await.err().unwrap();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::IndexNotFound(_))));
}

#[tokio::test]
async fn empty_docs_dir_is_an_error() {
    let dir = tempdir().unwrap();
    let settings = settings(&dir);
    std::fs::create_dir_all(&settings.docs_dir).unwrap();

    let err = Indexer::new(settings, EmbeddingService::local(DIM))
        .run()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No PDF files found"));
}
