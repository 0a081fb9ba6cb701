//! Vector index: chunking, embeddings, storage and the indexing pipeline.

pub mod chunker;
pub mod embeddings;
pub mod indexer;
pub mod models;
pub mod qdrant;
pub mod store;

pub use chunker::Chunker;
pub use embeddings::{cosine_similarity, EmbeddingService, LocalEmbedder};
pub use indexer::{discover_pdfs, IndexStats, Indexer};
pub use models::{Chunk, IndexedChunk, RankedChunk, ScoredChunk};
pub use qdrant::QdrantIndex;
pub use store::{LocalIndex, StoreStats, VectorStore};
