//! Page text → overlapping chunks that keep their page metadata.

use std::collections::VecDeque;

use tracing::warn;

use super::models::Chunk;
use crate::pdf::PageDocument;

/// Separators tried in order, from paragraph breaks down to single characters.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Recursive character splitter with overlap.
///
/// Sizes are counted in characters. Text is split on the first separator that
/// occurs in it; pieces that are still too long are split again with the next
/// separator. Small pieces are merged back into chunks of at most `size`
/// characters, carrying up to `overlap` characters into the next chunk.
#[derive(Debug, Clone)]
pub struct Chunker {
    size: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl Chunker {
    /// Create a new chunker.
    pub fn new(size: usize, overlap: usize) -> Self {
        Self::with_separators(size, overlap, DEFAULT_SEPARATORS)
    }

    pub fn with_separators(size: usize, overlap: usize, separators: &[&str]) -> Self {
        let size = size.max(1);
        Self {
            size,
            overlap: overlap.min(size.saturating_sub(1)),
            separators: separators.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into overlapping, trimmed, non-empty pieces.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Chunk every page, numbering chunks globally in page order.
    pub fn chunk_pages(&self, pages: &[PageDocument]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            for text in self.split_text(&page.text) {
                let index = chunks.len();
                chunks.push(Chunk::new(index, text, page.metadata.clone()));
            }
        }
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut output = Vec::new();
        let mut good: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                output.extend(self.merge(std::mem::take(&mut good)));
            }
            if remaining.is_empty() {
                output.push(piece);
            } else {
                output.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !good.is_empty() {
            output.extend(self.merge(good));
        }
        output
    }

    /// Merge small pieces into chunks of at most `size` characters.
    fn merge(&self, pieces: Vec<String>) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<(String, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(&piece);
            if total + len > self.size {
                if total > self.size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.size
                    );
                }
                if !current.is_empty() {
                    push_joined(&mut docs, &current);
                    while total > self.overlap || (total + len > self.size && total > 0) {
                        match current.pop_front() {
                            Some((_, front_len)) => total -= front_len,
                            None => break,
                        }
                    }
                }
            }
            total += len;
            current.push_back((piece, len));
        }

        push_joined(&mut docs, &current);
        docs
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn push_joined(docs: &mut Vec<String>, current: &VecDeque<(String, usize)>) {
    let joined: String = current.iter().map(|(piece, _)| piece.as_str()).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// Split on `separator`, keeping each separator at the start of the piece that
/// follows it. An empty separator splits into characters.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (position, _) in text.match_indices(separator) {
        if position > start {
            pieces.push(text[start..position].to_string());
        }
        start = position;
    }
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}
