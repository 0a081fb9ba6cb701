//! PDF ingestion: page text, section classification and embedded images.

pub mod bitmap;
pub mod images;
pub mod section;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lopdf::Document;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use images::{ImageCatalog, ImageRecord};
pub use section::Section;

use crate::error::Result;

static TRAILING_SPACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+\n").expect("valid trailing-space regex"));
static EXTRA_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank-line regex"));

/// Metadata carried by every page (and inherited by its chunks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// File stem of the source PDF
    pub source: String,
    /// 1-based page number
    pub page: u32,
    pub total_pages: u32,
    pub has_images: bool,
    /// Paths of images extracted from this page
    pub images: Vec<String>,
    pub section: Section,
}

/// Text of one non-blank page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDocument {
    pub text: String,
    pub metadata: PageMetadata,
}

/// Everything extracted from one PDF.
#[derive(Debug, Clone, Default)]
pub struct ProcessedPdf {
    pub pages: Vec<PageDocument>,
    pub images: ImageCatalog,
}

impl ProcessedPdf {
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

/// Normalise extracted page text: unify newlines, drop trailing spaces,
/// collapse runs of blank lines.
pub fn clean_text(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = TRAILING_SPACES.replace_all(&text, "\n");
    let text = EXTRA_BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Extracts page documents and images from PDF files.
#[derive(Debug, Clone)]
pub struct PdfProcessor {
    images_dir: PathBuf,
}

impl PdfProcessor {
    pub fn new(images_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Process one PDF. A PDF that cannot be opened yields an empty result.
    pub fn process(&self, path: &Path) -> ProcessedPdf {
        match self.try_process(path) {
            Ok(processed) => processed,
            Err(e) => {
                warn!(pdf = %path.display(), "Failed to process PDF: {}", e);
                ProcessedPdf::default()
            }
        }
    }

    /// Fallible variant of [`PdfProcessor::process`].
    pub fn try_process(&self, path: &Path) -> Result<ProcessedPdf> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        let document = Document::load(path)?;
        fs::create_dir_all(&self.images_dir)?;

        let pages: BTreeMap<u32, lopdf::ObjectId> = document.get_pages();
        let total_pages = pages.len() as u32;
        let mut catalog = ImageCatalog::new();
        let mut page_documents = Vec::new();

        for (page_number, page_id) in pages {
            let raw_images = images::extract_page_images(&document, page_id);
            let saved = images::save_page_images(
                raw_images,
                &self.images_dir,
                &stem,
                page_number,
                &mut catalog,
            );

            let text = match document.extract_text(&[page_number]) {
                Ok(text) => clean_text(&text),
                Err(e) => {
                    warn!(pdf = %path.display(), page = page_number, "Text extraction failed: {}", e);
                    String::new()
                }
            };

            if text.is_empty() {
                debug!(pdf = %path.display(), page = page_number, "Skipping blank page");
                continue;
            }

            let images: Vec<String> = saved
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
            page_documents.push(PageDocument {
                metadata: PageMetadata {
                    source: stem.clone(),
                    page: page_number,
                    total_pages,
                    has_images: !images.is_empty(),
                    images,
                    section: Section::classify(&text),
                },
                text,
            });
        }

        info!(
            pdf = %path.display(),
            pages = page_documents.len(),
            images = catalog.len(),
            "PDF processed"
        );

        Ok(ProcessedPdf {
            pages: page_documents,
            images: catalog,
        })
    }
}
