//! Cohere rerank API client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http_client;
use crate::config::DEFAULT_RERANK_MODEL;
use crate::{Error, Result};

const COHERE_API_URL: &str = "https://api.cohere.com/v1";
/// Reranking is on the question path; a slow call falls back to vector order.
pub const COHERE_TIMEOUT: Duration = Duration::from_secs(30);

/// One reranked document: index into the request's documents plus score.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RerankResult {
    pub index: usize,
    pub relevance_score: f32,
}

/// Cohere client.
#[derive(Debug, Clone)]
pub struct CohereClient {
    http: Client,
    api_key: String,
    pub(crate) base_url: String,
    model: String,
}

impl CohereClient {
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey("COHERE_API_KEY is empty".to_string()));
        }

        let http = http_client(COHERE_TIMEOUT)
            .map_err(|e| Error::CohereError(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: COHERE_API_URL.to_string(),
            model: DEFAULT_RERANK_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = http_client(timeout)
            .map_err(|e| Error::CohereError(format!("HTTP client error: {}", e)))?;
        Ok(self)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Rerank `documents` against `query`, returning at most `top_n` results
    /// ordered by descending relevance.
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankResult>> {
        if documents.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        let request = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n: top_n.min(documents.len()),
        };

        debug!(model = %self.model, documents = documents.len(), top_n, "Cohere rerank");
        let response = self
            .http
            .post(format!("{}/rerank", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::CohereError(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::CohereError(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::CohereError(format!("{}: {}", status, text)));
        }

        let parsed: RerankResponse = serde_json::from_str(&text)
            .map_err(|e| Error::CohereError(format!("invalid response: {}", e)))?;

        let mut results = parsed.results;
        if let Some(bad) = results.iter().find(|r| r.index >= documents.len()) {
            return Err(Error::CohereError(format!(
                "result index {} out of range for {} documents",
                bad.index,
                documents.len()
            )));
        }
        results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        results.truncate(top_n);
        Ok(results)
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn docs() -> Vec<String> {
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    }

    #[tokio::test]
    async fn test_rerank_orders_by_relevance() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rerank")
                    .header("Authorization", "Bearer co-key")
                    .json_body_includes(r#"{"model":"rerank-multilingual-v3.0","top_n":2}"#);
                then.status(200).json_body(json!({
                    "results": [
                        {"index": 0, "relevance_score": 0.4},
                        {"index": 2, "relevance_score": 0.9}
                    ]
                }));
            })
            .await;

        let client = CohereClient::new("co-key")
            .unwrap()
            .with_base_url(&server.base_url());
        let results = client.rerank("query", &docs(), 2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(results[0].index, 2);
        assert_eq!(results[1].index, 0);
    }

    #[tokio::test]
    async fn test_rerank_rejects_out_of_range_index() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rerank");
                then.status(200)
                    .json_body(json!({"results": [{"index": 7, "relevance_score": 0.9}]}));
            })
            .await;

        let client = CohereClient::new("co-key")
            .unwrap()
            .with_base_url(&server.base_url());
        let err = client.rerank("query", &docs(), 2).await.unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn test_rerank_http_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rerank");
                then.status(401).body("invalid api token");
            })
            .await;

        let client = CohereClient::new("co-key")
            .unwrap()
            .with_base_url(&server.base_url());
        let err = client.rerank("query", &docs(), 2).await.unwrap_err();
        assert!(matches!(err, Error::CohereError(_)));
    }

    #[tokio::test]
    async fn test_rerank_empty_documents_skips_request() {
        let client = CohereClient::new("co-key")
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        assert!(client.rerank("query", &[], 5).await.unwrap().is_empty());
    }
}
