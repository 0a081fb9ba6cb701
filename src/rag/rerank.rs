//! Second retrieval stage: reorder candidates by relevance.

use tracing::{debug, warn};

use crate::config::Config;
use crate::index::{RankedChunk, ScoredChunk};
use crate::integrations::CohereClient;

/// Reranking strategy.
pub enum Reranker {
    /// Cohere rerank API
    Cohere(CohereClient),
    /// Keep retrieval order; relevance equals the retrieval score
    Passthrough,
}

impl Reranker {
    /// Cohere when a key is configured, passthrough otherwise.
    pub fn from_config(config: &Config) -> Self {
        match config.cohere_api_key.as_deref() {
            Some(key) => match CohereClient::new(key) {
                Ok(client) => Reranker::Cohere(client.with_model(&config.rag.rerank_model)),
                Err(e) => {
                    warn!("Cohere reranker unavailable: {}", e);
                    Reranker::Passthrough
                }
            },
            None => Reranker::Passthrough,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Reranker::Cohere(_) => "cohere",
            Reranker::Passthrough => "passthrough",
        }
    }

    /// Keep the best `top_n` candidates. Never fails: a Cohere error falls
    /// back to the first `top_n` in retrieval order.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
        top_n: usize,
    ) -> Vec<RankedChunk> {
        match self {
            Reranker::Passthrough => passthrough(candidates, top_n),
            Reranker::Cohere(client) => {
                let documents: Vec<String> =
                    candidates.iter().map(|c| c.chunk.text.clone()).collect();
                match client.rerank(query, &documents, top_n).await {
                    Ok(results) => {
                        debug!(results = results.len(), "Cohere rerank done");
                        results
                            .into_iter()
                            .filter_map(|r| {
                                let candidate = candidates.get(r.index)?;
                                Some(RankedChunk {
                                    chunk: candidate.chunk.clone(),
                                    score: candidate.score,
                                    relevance: r.relevance_score,
                                })
                            })
                            .collect()
                    }
                    Err(e) => {
                        warn!("Reranking failed, keeping retrieval order: {}", e);
                        passthrough(candidates, top_n)
                    }
                }
            }
        }
    }
}

fn passthrough(candidates: Vec<ScoredChunk>, top_n: usize) -> Vec<RankedChunk> {
    candidates
        .into_iter()
        .take(top_n)
        .map(|c| RankedChunk {
            relevance: c.score,
            score: c.score,
            chunk: c.chunk,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Chunk;
    use crate::pdf::{PageMetadata, Section};
    use httpmock::prelude::*;
    use serde_json::json;

    fn candidates() -> Vec<ScoredChunk> {
        (0..4)
            .map(|i| ScoredChunk {
                chunk: Chunk::new(
                    i,
                    format!("text {}", i),
                    PageMetadata {
                        source: "guide".to_string(),
                        page: 1,
                        total_pages: 1,
                        has_images: false,
                        images: vec![],
                        section: Section::General,
                    },
                ),
                score: 0.9 - i as f32 * 0.1,
            })
            .collect()
    }

    #[tokio::test]
    async fn passthrough_keeps_order_and_uses_score_as_relevance() {
        let ranked = Reranker::Passthrough.rerank("q", candidates(), 2).await;
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].chunk.chunk_id, "chunk_0");
        assert_eq!(ranked[1].relevance, ranked[1].score);
    }

    #[tokio::test]
    async fn cohere_reorders_candidates() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rerank");
                then.status(200).json_body(json!({
                    "results": [
                        {"index": 3, "relevance_score": 0.97},
                        {"index": 1, "relevance_score": 0.42}
                    ]
                }));
            })
            .await;

        let client = CohereClient::new("co-key")
            .unwrap()
            .with_base_url(&server.base_url());
        let ranked = Reranker::Cohere(client).rerank("q", candidates(), 2).await;

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].chunk.chunk_id, "chunk_3");
        assert!((ranked[0].relevance - 0.97).abs() < 1e-6);
        assert!((ranked[0].score - 0.6).abs() < 1e-6);
        assert_eq!(ranked[1].chunk.chunk_id, "chunk_1");
    }

    #[tokio::test]
    async fn cohere_failure_falls_back_to_retrieval_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rerank");
                then.status(500).body("boom");
            })
            .await;

        let client = CohereClient::new("co-key")
            .unwrap()
            .with_base_url(&server.base_url());
        let ranked = Reranker::Cohere(client).rerank("q", candidates(), 3).await;

        let ids: Vec<_> = ranked.iter().map(|r| r.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["chunk_0", "chunk_1", "chunk_2"]);
    }

    #[tokio::test]
    async fn slow_cohere_times_out_to_retrieval_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rerank");
                then.status(200)
                    .delay(std::time::Duration::from_secs(5))
                    .json_body(json!({"results": [{"index": 2, "relevance_score": 0.9}]}));
            })
            .await;

        let client = CohereClient::new("co-key")
            .unwrap()
            .with_base_url(&server.base_url())
            .with_timeout(std::time::Duration::from_millis(200))
            .unwrap();
        let ranked = Reranker::Cohere(client).rerank("q", candidates(), 2).await;

        let ids: Vec<_> = ranked.iter().map(|r| r.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["chunk_0", "chunk_1"]);
    }
}
