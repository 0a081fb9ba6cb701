//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod ask;
pub mod chat;
pub mod demo;
pub mod doctor;
pub mod index;
pub mod models;
pub mod serve;

use crate::rag::{group_images_by_document, Answer};

pub use serve::ServeConfig;

/// Terminal rendering of an answer: text, images grouped by document, sources.
pub fn render_answer(answer: &Answer) -> String {
    let mut out = String::new();
    out.push_str("🤖 Answer:\n\n");
    out.push_str(answer.answer.trim());
    out.push('\n');

    let groups = group_images_by_document(&answer.images);
    if !groups.is_empty() {
        out.push_str("\n🖼️  Related images:\n");
        for (document, files) in &groups {
            out.push_str(&format!("  📄 {}\n", document));
            for file in files {
                out.push_str(&format!("     - {}\n", file.display()));
            }
        }
    }

    if !answer.sources.is_empty() {
        out.push_str("\n📚 Sources:\n");
        for (i, source) in answer.sources.iter().enumerate() {
            out.push_str(&format!(
                "  {}. {} (page {}, {}) relevance {}\n",
                i + 1,
                source.document,
                source.page,
                source.section,
                source.relevance
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::{AnswerStatus, Source};
    use tempfile::tempdir;

    #[test]
    fn render_includes_existing_images_and_sources() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("guide_p2_img0.jpg");
        std::fs::write(&image, b"jpg").unwrap();

        let answer = Answer {
            answer: "Replace JavaDelegates with job workers.".to_string(),
            images: vec![
                image.to_string_lossy().into_owned(),
                dir.path().join("missing_p1_img0.jpg").to_string_lossy().into_owned(),
            ],
            sources: vec![Source {
                document: "guide".to_string(),
                page: 2,
                section: "code_conversion".to_string(),
                relevance: "0.91".to_string(),
            }],
            status: AnswerStatus::Answered,
        };

        let text = render_answer(&answer);
        assert!(text.contains("Replace JavaDelegates"));
        assert!(text.contains("📄 guide\n"));
        assert!(!text.contains("missing_p1_img0"));
        assert!(text.contains("1. guide (page 2, code_conversion) relevance 0.91"));
    }

    #[test]
    fn render_failed_answer_keeps_sources() {
        let answer = Answer {
            answer: "Error generating answer: quota".to_string(),
            images: vec![],
            sources: vec![Source {
                document: "guide".to_string(),
                page: 1,
                section: "general".to_string(),
                relevance: "0.10".to_string(),
            }],
            status: AnswerStatus::GenerationFailed,
        };

        let text = render_answer(&answer);
        assert!(text.contains("quota"));
        assert!(text.contains("Sources"));
        assert!(!text.contains("Related images"));
    }
}
