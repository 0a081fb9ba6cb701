//! Indexing pipeline: PDFs → pages + images → chunks → embeddings → store.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::chunker::Chunker;
use super::embeddings::EmbeddingService;
use super::models::{Chunk, IndexedChunk};
use super::store::VectorStore;
use crate::config::{Config, IndexSettings};
use crate::lock::IndexLock;
use crate::metrics;
use crate::pdf::{ImageCatalog, PageDocument, PdfProcessor, Section};

/// Summary of an indexing run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub pages: usize,
    pub chunks: usize,
    pub images: usize,
    pub chunks_with_images: usize,
    /// Page count per section, most frequent first
    pub sections: Vec<(Section, usize)>,
}

impl IndexStats {
    pub fn compute(pages: &[PageDocument], chunks: &[Chunk], images: &ImageCatalog) -> Self {
        let documents: HashSet<&str> = pages.iter().map(|p| p.metadata.source.as_str()).collect();

        let mut counts: BTreeMap<Section, usize> = BTreeMap::new();
        for page in pages {
            *counts.entry(page.metadata.section).or_default() += 1;
        }
        let mut sections: Vec<(Section, usize)> = counts.into_iter().collect();
        // Stable sort keeps ties in section order
        sections.sort_by(|a, b| b.1.cmp(&a.1));

        Self {
            documents: documents.len(),
            pages: pages.len(),
            chunks: chunks.len(),
            images: images.len(),
            chunks_with_images: chunks.iter().filter(|c| c.metadata.has_images).count(),
            sections,
        }
    }
}

/// `*.pdf` files directly inside `dir`, sorted by name.
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    anyhow::ensure!(
        dir.is_dir(),
        "Documentation directory {} does not exist",
        dir.display()
    );

    let mut pdfs: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();
    Ok(pdfs)
}

/// Builds the vector index from the documentation directory.
pub struct Indexer {
    settings: IndexSettings,
    embeddings: EmbeddingService,
    processor: PdfProcessor,
    chunker: Chunker,
}

impl Indexer {
    pub fn new(settings: IndexSettings, embeddings: EmbeddingService) -> Self {
        Self {
            processor: PdfProcessor::new(&settings.images_dir),
            chunker: Chunker::new(settings.chunk_size, settings.chunk_overlap),
            settings,
            embeddings,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let embeddings = EmbeddingService::from_config(config)?;
        Ok(Self::new(config.index.clone(), embeddings))
    }

    /// Run the whole pipeline and replace the index.
    pub async fn run(&self) -> Result<IndexStats> {
        let started = Instant::now();
        let _lock = IndexLock::acquire(&self.settings.index_dir)?;

        let pdfs = discover_pdfs(&self.settings.docs_dir)?;
        anyhow::ensure!(
            !pdfs.is_empty(),
            "No PDF files found in {}",
            self.settings.docs_dir.display()
        );
        info!("Found {} documents", pdfs.len());

        let mut pages = Vec::new();
        let mut catalog = ImageCatalog::new();
        for pdf in &pdfs {
            let processed = self.processor.process(pdf);
            if processed.pages.is_empty() {
                warn!(pdf = %pdf.display(), "No text extracted");
            }
            pages.extend(processed.pages);
            catalog.extend(processed.images);
        }

        let chunks = self.chunker.chunk_pages(&pages);
        anyhow::ensure!(!chunks.is_empty(), "No text could be extracted from the PDFs");
        info!("{} chunks created", chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embeddings.embed_documents(&texts).await?;
        let stats = IndexStats::compute(&pages, &chunks, &catalog);

        let indexed: Vec<IndexedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunk { chunk, embedding })
            .collect();

        let mut store = VectorStore::create(&self.settings)?;
        let written = store
            .replace_all(indexed, self.embeddings.backend_name())
            .await
            .context("Failed to write vector index")?;
        metrics::record_chunks_indexed(written);

        // Only a stored index gets a matching catalog
        catalog
            .save(&self.settings.image_metadata)
            .with_context(|| {
                format!(
                    "Failed to write image metadata {}",
                    self.settings.image_metadata.display()
                )
            })?;

        info!(
            chunks = written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            backend = store.backend_name(),
            "Indexing finished"
        );
        Ok(stats)
    }
}
