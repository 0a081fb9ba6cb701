//! Prompt assembly and answer presentation helpers.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::index::RankedChunk;

/// Images shown per document in the chat surfaces.
pub const MAX_IMAGES_PER_DOCUMENT: usize = 4;

const RULE: &str = "==================================================";

static IMAGE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)_p\d+_img\d+\.[A-Za-z0-9]+$").expect("valid image name regex"));

/// Citation shown under an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub document: String,
    pub page: u32,
    pub section: String,
    /// Relevance formatted with two decimals
    pub relevance: String,
}

/// Render reranked chunks for the prompt and collect their image paths
/// (deduplicated, first occurrence order).
pub fn format_chunks(chunks: &[RankedChunk]) -> (String, Vec<String>) {
    let mut blocks = Vec::with_capacity(chunks.len());
    let mut images: Vec<String> = Vec::new();

    for (i, ranked) in chunks.iter().enumerate() {
        let meta = &ranked.chunk.metadata;
        let mut block = format!(
            "\n---\nCHUNK {} (Relevance: {:.2})\nDocument: {}\nPage: {}\nSection: {}\n",
            i + 1,
            ranked.relevance,
            meta.source,
            meta.page,
            meta.section
        );

        if meta.has_images && !meta.images.is_empty() {
            let names: Vec<String> = meta.images.iter().map(|p| file_name(p)).collect();
            block.push_str("[IMAGES] This chunk contains relevant images\n");
            block.push_str(&format!("Images: {}\n", names.join(", ")));
            for path in &meta.images {
                if !images.contains(path) {
                    images.push(path.clone());
                }
            }
        }

        block.push_str(&format!("\nCONTENT:\n{}\n", ranked.chunk.text));
        blocks.push(block);
    }

    (blocks.join("\n"), images)
}

/// Full prompt: system prompt, chunks, question and closing instructions.
pub fn build_prompt(system_prompt: &str, formatted_chunks: &str, question: &str) -> String {
    format!(
        "{system}\n\n{rule}\nRELEVANT DOCUMENTATION CHUNKS:\n{rule}\n\n{chunks}\n\n\
         {rule}\nDEVELOPER QUESTION:\n{rule}\n\n{question}\n\n\
         {rule}\nFINAL INSTRUCTIONS:\n{rule}\n\n\
         Based EXCLUSIVELY on the chunks above, give a complete and didactic answer.\n\
         If any chunk is marked with [IMAGES], mention those images and describe what they illustrate.\n\
         Always cite the sources (document and page) of every piece of information.\n",
        system = system_prompt.trim_end(),
        rule = RULE,
        chunks = formatted_chunks,
        question = question.trim(),
    )
}

/// First `max` reranked chunks as citations.
pub fn sources(chunks: &[RankedChunk], max: usize) -> Vec<Source> {
    chunks
        .iter()
        .take(max)
        .map(|ranked| Source {
            document: ranked.chunk.metadata.source.clone(),
            page: ranked.chunk.metadata.page,
            section: ranked.chunk.metadata.section.to_string(),
            relevance: format!("{:.2}", ranked.relevance),
        })
        .collect()
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Document name encoded in an extracted image file name.
pub fn image_document(path: &str) -> String {
    let name = file_name(path);
    if let Some(caps) = IMAGE_NAME.captures(&name) {
        return caps[1].to_string();
    }
    name.split("_p").next().unwrap_or(&name).to_string()
}

/// Group existing image files by document, keeping first-seen order and at
/// most [`MAX_IMAGES_PER_DOCUMENT`] per document.
pub fn group_images_by_document(paths: &[String]) -> Vec<(String, Vec<PathBuf>)> {
    let mut groups: Vec<(String, Vec<PathBuf>)> = Vec::new();

    for path in paths {
        let file = PathBuf::from(path);
        if !file.is_file() {
            continue;
        }
        let document = image_document(path);
        match groups.iter_mut().find(|(doc, _)| *doc == document) {
            Some((_, files)) => {
                if files.len() < MAX_IMAGES_PER_DOCUMENT && !files.contains(&file) {
                    files.push(file);
                }
            }
            None => groups.push((document, vec![file])),
        }
    }

    groups
}
