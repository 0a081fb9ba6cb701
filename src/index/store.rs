//! Vector store front-end: a local JSON index or a Qdrant collection.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::embeddings::cosine_similarity;
use super::models::{IndexedChunk, ScoredChunk};
use super::qdrant::QdrantIndex;
use crate::config::{IndexSettings, VectorBackend};
use crate::error::Error;

pub const INDEX_FILE: &str = "index.json";

/// On-disk layout of the local index.
#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    collection: String,
    embedding_backend: String,
    dimension: usize,
    created_at: DateTime<Utc>,
    chunks: Vec<IndexedChunk>,
}

/// Brute-force cosine index persisted as JSON under the index directory.
#[derive(Debug)]
pub struct LocalIndex {
    dir: PathBuf,
    collection: String,
    embedding_backend: String,
    dimension: usize,
    created_at: Option<DateTime<Utc>>,
    chunks: Vec<IndexedChunk>,
}

impl LocalIndex {
    /// Empty index that will be written to `dir`.
    pub fn create(dir: impl Into<PathBuf>, collection: &str) -> Self {
        Self {
            dir: dir.into(),
            collection: collection.to_string(),
            embedding_backend: String::new(),
            dimension: 0,
            created_at: None,
            chunks: Vec::new(),
        }
    }

    /// Load a persisted index. A missing index file is `IndexNotFound`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Err(Error::IndexNotFound(dir.display().to_string()).into());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: IndexFile = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt index file {}", path.display()))?;

        debug!(chunks = file.chunks.len(), "Local index loaded");
        Ok(Self {
            dir,
            collection: file.collection,
            embedding_backend: file.embedding_backend,
            dimension: file.dimension,
            created_at: Some(file.created_at),
            chunks: file.chunks,
        })
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn embedding_backend(&self) -> &str {
        &self.embedding_backend
    }

    /// Replace the whole index and persist it.
    pub fn replace_all(&mut self, chunks: Vec<IndexedChunk>, embedding_backend: &str) -> Result<usize> {
        let dimension = chunks.first().map(|c| c.embedding.len()).unwrap_or(0);
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dimension) {
            anyhow::bail!(
                "chunk {} has dimension {}, expected {}",
                bad.chunk.chunk_id,
                bad.embedding.len(),
                dimension
            );
        }

        let file = IndexFile {
            collection: self.collection.clone(),
            embedding_backend: embedding_backend.to_string(),
            dimension,
            created_at: Utc::now(),
            chunks,
        };

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.index_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&file)?)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to move index to {}", path.display()))?;

        self.embedding_backend = file.embedding_backend;
        self.dimension = file.dimension;
        self.created_at = Some(file.created_at);
        self.chunks = file.chunks;
        info!(chunks = self.chunks.len(), path = %path.display(), "Local index written");
        Ok(self.chunks.len())
    }

    /// Top `limit` chunks by cosine similarity, best first.
    pub fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        if self.chunks.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        anyhow::ensure!(
            query_embedding.len() == self.dimension,
            "query embedding has dimension {} but the index was built with {} ({}); re-run `index` with the same embedding provider",
            query_embedding.len(),
            self.dimension,
            self.embedding_backend
        );

        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query_embedding, &entry.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Summary shown by `doctor` and `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub backend: &'static str,
    pub location: String,
    pub chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Vector store selected by configuration.
pub enum VectorStore {
    Local(LocalIndex),
    Qdrant(QdrantIndex),
}

impl VectorStore {
    /// Open an existing index for querying.
    pub async fn open(settings: &IndexSettings) -> Result<Self> {
        match settings.backend {
            VectorBackend::Local => Ok(VectorStore::Local(LocalIndex::open(&settings.index_dir)?)),
            VectorBackend::Qdrant => {
                let index = QdrantIndex::connect(&settings.qdrant_url, &settings.collection)?;
                index.ensure_exists().await?;
                Ok(VectorStore::Qdrant(index))
            }
        }
    }

    /// Fresh store for (re)indexing; nothing is read or written yet.
    pub fn create(settings: &IndexSettings) -> Result<Self> {
        match settings.backend {
            VectorBackend::Local => Ok(VectorStore::Local(LocalIndex::create(
                &settings.index_dir,
                &settings.collection,
            ))),
            VectorBackend::Qdrant => Ok(VectorStore::Qdrant(QdrantIndex::connect(
                &settings.qdrant_url,
                &settings.collection,
            )?)),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            VectorStore::Local(_) => "local",
            VectorStore::Qdrant(_) => "qdrant",
        }
    }

    /// Replace everything in the store with `chunks`.
    pub async fn replace_all(&mut self, chunks: Vec<IndexedChunk>, embedding_backend: &str) -> Result<usize> {
        match self {
            VectorStore::Local(index) => index.replace_all(chunks, embedding_backend),
            VectorStore::Qdrant(index) => index.replace_all(&chunks).await,
        }
    }

    pub async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        match self {
            VectorStore::Local(index) => index.search(query_embedding, limit),
            VectorStore::Qdrant(index) => index.search(query_embedding, limit).await,
        }
    }

    pub async fn len(&self) -> Result<usize> {
        match self {
            VectorStore::Local(index) => Ok(index.len()),
            VectorStore::Qdrant(index) => index.len().await,
        }
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        match self {
            VectorStore::Local(index) => Ok(StoreStats {
                backend: self.backend_name(),
                location: index.dir.display().to_string(),
                chunks: index.len(),
                dimension: Some(index.dimension),
                created_at: index.created_at,
            }),
            VectorStore::Qdrant(index) => Ok(StoreStats {
                backend: self.backend_name(),
                location: index.location(),
                chunks: index.len().await?,
                dimension: None,
                created_at: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::models::Chunk;
    use crate::pdf::{PageMetadata, Section};
    use tempfile::tempdir;

    fn indexed(index: usize, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            chunk: Chunk::new(
                index,
                format!("chunk text {}", index),
                PageMetadata {
                    source: "guide".to_string(),
                    page: index as u32 + 1,
                    total_pages: 3,
                    has_images: false,
                    images: vec![],
                    section: Section::General,
                },
            ),
            embedding,
        }
    }

    #[test]
    fn open_missing_index_is_index_not_found() {
        let dir = tempdir().unwrap();
        let err = LocalIndex::open(dir.path().join("vector_index")).unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        assert!(matches!(err, Error::IndexNotFound(_)));
    }

    #[test]
    fn replace_all_persists_and_search_orders_by_similarity() {
        let dir = tempdir().unwrap();
        let index_dir = dir.path().join("vector_index");

        let mut index = LocalIndex::create(&index_dir, "camunda_migration");
        index
            .replace_all(
                vec![
                    indexed(0, vec![1.0, 0.0]),
                    indexed(1, vec![0.0, 1.0]),
                    indexed(2, vec![0.7, 0.7]),
                ],
                "local",
            )
            .unwrap();

        let reopened = LocalIndex::open(&index_dir).unwrap();
        assert_eq!(reopened.len(), 3);
        assert_eq!(reopened.embedding_backend(), "local");

        let hits = reopened.search(&[1.0, 0.1], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.chunk_id, "chunk_0");
        assert_eq!(hits[1].chunk.chunk_id, "chunk_2");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn reindexing_replaces_previous_chunks() {
        let dir = tempdir().unwrap();
        let mut index = LocalIndex::create(dir.path(), "c");
        index
            .replace_all(vec![indexed(0, vec![1.0]), indexed(1, vec![1.0])], "local")
            .unwrap();
        index.replace_all(vec![indexed(0, vec![1.0])], "local").unwrap();

        assert_eq!(LocalIndex::open(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn search_rejects_dimension_mismatch() {
        let dir = tempdir().unwrap();
        let mut index = LocalIndex::create(dir.path(), "c");
        index.replace_all(vec![indexed(0, vec![1.0, 0.0])], "gemini").unwrap();

        let err = index.search(&[1.0, 0.0, 0.0], 5).unwrap_err();
        assert!(err.to_string().contains("same embedding provider"));
    }

    #[test]
    fn replace_all_rejects_mixed_dimensions() {
        let dir = tempdir().unwrap();
        let mut index = LocalIndex::create(dir.path(), "c");
        let err = index
            .replace_all(vec![indexed(0, vec![1.0, 0.0]), indexed(1, vec![1.0])], "local")
            .unwrap_err();
        assert!(err.to_string().contains("chunk_1"));
    }

    #[tokio::test]
    async fn vector_store_local_stats() {
        let dir = tempdir().unwrap();
        let settings = IndexSettings {
            index_dir: dir.path().join("vector_index"),
            ..IndexSettings::default()
        };

        assert!(VectorStore::open(&settings).await.is_err());

        let mut store = VectorStore::create(&settings).unwrap();
        store
            .replace_all(vec![indexed(0, vec![0.6, 0.8])], "local")
            .await
            .unwrap();

        let store = VectorStore::open(&settings).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.backend, "local");
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.dimension, Some(2));
        assert!(stats.created_at.is_some());
        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(store.search(&[0.6, 0.8], 10).await.unwrap().len(), 1);
    }
}
