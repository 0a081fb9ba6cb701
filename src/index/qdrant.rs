//! Vector index backed by Qdrant

use std::collections::HashMap;

use anyhow::Result;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeleteCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{Chunk, IndexedChunk, ScoredChunk};
use crate::error::Error;
use crate::pdf::{PageMetadata, Section};

const UPSERT_BATCH: usize = 256;

/// Chunk collection stored in a Qdrant server.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    url: String,
}

impl QdrantIndex {
    /// Connect to Qdrant server
    pub fn connect(url: &str, collection: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build()?;
        Ok(Self {
            client,
            collection: collection.to_string(),
            url: url.to_string(),
        })
    }

    pub fn location(&self) -> String {
        format!("{}/{}", self.url, self.collection)
    }

    pub async fn exists(&self) -> Result<bool> {
        let collections = self.client.list_collections().await?;
        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == self.collection))
    }

    /// Fail with `IndexNotFound` when the collection is missing.
    pub async fn ensure_exists(&self) -> Result<()> {
        if !self.exists().await? {
            return Err(Error::IndexNotFound(self.location()).into());
        }
        Ok(())
    }

    /// Drop and recreate the collection, then upsert every chunk.
    pub async fn replace_all(&self, chunks: &[IndexedChunk]) -> Result<usize> {
        if self.exists().await? {
            info!("Dropping existing collection '{}'", self.collection);
            self.client
                .delete_collection(DeleteCollectionBuilder::new(&self.collection))
                .await?;
        }

        let dimension = chunks.first().map(|c| c.embedding.len()).unwrap_or(0);
        anyhow::ensure!(dimension > 0, "cannot create a collection without embeddings");

        info!(dimension, "Creating collection '{}'", self.collection);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await?;

        for batch in chunks.chunks(UPSERT_BATCH) {
            let points: Vec<PointStruct> = batch
                .iter()
                .map(|indexed| {
                    PointStruct::new(
                        point_id(&indexed.chunk.chunk_id).to_string(),
                        indexed.embedding.clone(),
                        chunk_payload(&indexed.chunk),
                    )
                })
                .collect();
            debug!("Upserting {} points to Qdrant", points.len());
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
                .await?;
        }

        info!("Upserted {} chunks into '{}'", chunks.len(), self.collection);
        Ok(chunks.len())
    }

    /// Search for similar chunks
    pub async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let request =
            SearchPointsBuilder::new(&self.collection, query_embedding.to_vec(), limit as u64)
                .with_payload(true);
        let results = self.client.search_points(request).await?;

        Ok(results
            .result
            .into_iter()
            .filter_map(|point| {
                let chunk = chunk_from_payload(&point.payload)?;
                Some(ScoredChunk {
                    chunk,
                    score: point.score,
                })
            })
            .collect())
    }

    /// Number of points in the collection
    pub async fn len(&self) -> Result<usize> {
        let info = self.client.collection_info(&self.collection).await?;
        Ok(info
            .result
            .and_then(|r| r.points_count)
            .unwrap_or(0) as usize)
    }
}

/// Stable point id derived from the chunk id.
fn point_id(chunk_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes())
}

fn chunk_payload(chunk: &Chunk) -> HashMap<String, QdrantValue> {
    let meta = &chunk.metadata;
    // Image paths are stored as a JSON string, like the local index metadata.
    let images = serde_json::to_string(&meta.images).unwrap_or_else(|_| "[]".to_string());

    let mut payload: HashMap<String, QdrantValue> = HashMap::new();
    payload.insert("chunk_id".into(), chunk.chunk_id.clone().into());
    payload.insert("chunk_index".into(), (chunk.chunk_index as i64).into());
    payload.insert("text".into(), chunk.text.clone().into());
    payload.insert("source".into(), meta.source.clone().into());
    payload.insert("page".into(), (meta.page as i64).into());
    payload.insert("total_pages".into(), (meta.total_pages as i64).into());
    payload.insert("has_images".into(), meta.has_images.into());
    payload.insert("images".into(), images.into());
    payload.insert("section".into(), meta.section.as_str().to_string().into());
    payload
}

fn chunk_from_payload(payload: &HashMap<String, QdrantValue>) -> Option<Chunk> {
    let images: Vec<String> = payload
        .get("images")
        .and_then(|v| v.as_str())
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();

    Some(Chunk {
        chunk_id: payload.get("chunk_id")?.as_str()?.to_string(),
        chunk_index: payload.get("chunk_index")?.as_integer()? as usize,
        text: payload.get("text")?.as_str()?.to_string(),
        metadata: PageMetadata {
            source: payload.get("source")?.as_str()?.to_string(),
            page: payload.get("page")?.as_integer()? as u32,
            total_pages: payload
                .get("total_pages")
                .and_then(|v| v.as_integer())
                .unwrap_or(0) as u32,
            has_images: payload
                .get("has_images")
                .and_then(|v| v.as_bool())
                .unwrap_or(!images.is_empty()),
            images,
            section: payload
                .get("section")
                .and_then(|v| v.as_str())
                .map(|s| Section::from_name(s))
                .unwrap_or(Section::General),
        },
    })
}
