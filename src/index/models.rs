//! Data models for the vector index

use serde::{Deserialize, Serialize};

use crate::pdf::PageMetadata;

/// Piece of page text that is embedded and retrieved as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `chunk_<index>`, unique within one indexing run
    pub chunk_id: String,
    /// Position in the run, starting at 0
    pub chunk_index: usize,
    pub text: String,
    /// Metadata of the page the chunk was cut from
    pub metadata: PageMetadata,
}

impl Chunk {
    pub fn new(chunk_index: usize, text: String, metadata: PageMetadata) -> Self {
        Self {
            chunk_id: format!("chunk_{}", chunk_index),
            chunk_index,
            text,
            metadata,
        }
    }
}

/// Chunk stored together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Search hit with its cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Search hit after reranking. `relevance` equals `score` when no reranker ran.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub relevance: f32,
}
