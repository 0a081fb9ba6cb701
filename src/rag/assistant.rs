//! Question answering: retrieve → rerank → prompt → generate.

use std::time::Instant;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::context::{self, Source};
use super::llm::LlmClient;
use super::rerank::Reranker;
use crate::config::{Config, RagSettings};
use crate::index::{EmbeddingService, ScoredChunk, StoreStats, VectorStore};
use crate::metrics;

pub const NO_DOCUMENTS_MESSAGE: &str =
    "Could not retrieve any documents. Check that indexing has been run (`migration_assistant index`).";

/// How an answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Answered,
    NoDocuments,
    GenerationFailed,
}

impl AnswerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerStatus::Answered => "answered",
            AnswerStatus::NoDocuments => "no_documents",
            AnswerStatus::GenerationFailed => "generation_failed",
        }
    }
}

/// Answer with the images and sources that back it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    /// Image paths from the chunks used, deduplicated
    pub images: Vec<String>,
    pub sources: Vec<Source>,
    pub status: AnswerStatus,
}

impl Answer {
    fn no_documents() -> Self {
        Self {
            answer: NO_DOCUMENTS_MESSAGE.to_string(),
            images: Vec::new(),
            sources: Vec::new(),
            status: AnswerStatus::NoDocuments,
        }
    }
}

/// The migration assistant.
pub struct Assistant {
    store: VectorStore,
    embeddings: EmbeddingService,
    reranker: Reranker,
    llm: LlmClient,
    system_prompt: String,
    rag: RagSettings,
}

impl Assistant {
    pub fn new(
        store: VectorStore,
        embeddings: EmbeddingService,
        reranker: Reranker,
        llm: LlmClient,
        system_prompt: String,
        rag: RagSettings,
    ) -> Self {
        Self {
            store,
            embeddings,
            reranker,
            llm,
            system_prompt,
            rag,
        }
    }

    /// Open the index and build every client from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let llm = LlmClient::from_config(config)?;
        let embeddings = EmbeddingService::from_config(config)?;
        let store = VectorStore::open(&config.index).await?;
        let reranker = Reranker::from_config(config);
        let system_prompt = config.prompt.load_or_builtin();

        let assistant = Self::new(
            store,
            embeddings,
            reranker,
            llm,
            system_prompt,
            config.rag.clone(),
        );
        info!(
            llm = %assistant.llm.describe(),
            reranker = assistant.reranker.name(),
            store = assistant.store.backend_name(),
            "Assistant ready"
        );
        Ok(assistant)
    }

    /// One-line description for banners.
    pub fn describe(&self) -> String {
        format!(
            "LLM: {} | Rerank: {} | Index: {} | Retrieval: top {} → {}",
            self.llm.describe(),
            self.reranker.name(),
            self.store.backend_name(),
            self.rag.retrieval_top_k,
            self.rag.rerank_top_n
        )
    }

    pub fn llm_description(&self) -> String {
        self.llm.describe()
    }

    pub fn reranker_name(&self) -> &'static str {
        self.reranker.name()
    }

    pub async fn index_stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }

    /// Top-K candidates for a question.
    async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        let query = self.embeddings.embed_query(question).await?;
        self.store.search(&query, self.rag.retrieval_top_k).await
    }

    /// Answer a question. Failures are reported in the answer status.
    pub async fn ask(&self, question: &str) -> Answer {
        let started = Instant::now();
        let candidates = match self.retrieve(question).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Retrieval failed: {:#}", e);
                Vec::new()
            }
        };
        metrics::record_stage("retrieve", started.elapsed());

        if candidates.is_empty() {
            metrics::record_question(AnswerStatus::NoDocuments.as_str());
            return Answer::no_documents();
        }

        let rerank_started = Instant::now();
        let ranked = self
            .reranker
            .rerank(question, candidates, self.rag.rerank_top_n)
            .await;
        metrics::record_stage("rerank", rerank_started.elapsed());

        let (formatted, mut images) = context::format_chunks(&ranked);
        let prompt = context::build_prompt(&self.system_prompt, &formatted, question);

        let generate_started = Instant::now();
        let (answer, status) = match self.llm.generate(&prompt).await {
            Ok(answer) => (answer, AnswerStatus::Answered),
            Err(e) => {
                warn!("Generation failed: {:#}", e);
                images.clear();
                (
                    format!("Error generating answer: {:#}", e),
                    AnswerStatus::GenerationFailed,
                )
            }
        };
        metrics::record_stage("generate", generate_started.elapsed());
        metrics::record_question(status.as_str());

        info!(
            chunks = ranked.len(),
            images = images.len(),
            status = status.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Question answered"
        );

        Answer {
            answer,
            images,
            sources: context::sources(&ranked, self.rag.max_sources),
            status,
        }
    }
}
