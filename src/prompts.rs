//! System prompt loader.
//!
//! Prompts live in the `prompts/` directory at the project root. A copy of each
//! prompt is compiled into the binary so the assistant still works when the
//! directory is not shipped next to it.

use std::path::PathBuf;

use tracing::debug;

use crate::{Error, Result};

const CONCISE_FALLBACK: &str = include_str!("../prompts/concise.md");
const DETAILED_FALLBACK: &str = include_str!("../prompts/detailed.md");

/// Available system prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Short, bullet-point answers (default).
    Concise,
    /// Longer didactic answers with code comparisons.
    Detailed,
}

impl Prompt {
    /// Unknown names fall back to the concise prompt.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "detailed" => Prompt::Detailed,
            _ => Prompt::Concise,
        }
    }

    /// Prompt file name (Markdown).
    pub fn filename(&self) -> &'static str {
        match self {
            Prompt::Concise => "concise.md",
            Prompt::Detailed => "detailed.md",
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            Prompt::Concise => CONCISE_FALLBACK,
            Prompt::Detailed => DETAILED_FALLBACK,
        }
    }

    /// Load the prompt from disk.
    pub fn load(&self) -> Result<String> {
        load_prompt(self.filename())
    }

    /// Load the prompt from disk, or use the compiled-in copy.
    pub fn load_or_builtin(&self) -> String {
        match self.load() {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => self.builtin().to_string(),
            Err(e) => {
                debug!("Using built-in {} prompt: {}", self.filename(), e);
                self.builtin().to_string()
            }
        }
    }
}

/// Load a prompt by file name.
pub fn load_prompt(filename: &str) -> Result<String> {
    let path = prompts_dir().join(filename);
    std::fs::read_to_string(&path)
        .map_err(|e| Error::InvalidArgument(format!("Failed to load prompt {}: {}", filename, e)))
}

/// Path to the prompts directory.
pub fn prompts_dir() -> PathBuf {
    let candidates = [
        PathBuf::from("prompts"),
        PathBuf::from("../prompts"),
        PathBuf::from("../../prompts"),
    ];

    for path in candidates {
        if path.exists() {
            return path;
        }
    }

    PathBuf::from("prompts")
}

pub fn list_prompts() -> Vec<Prompt> {
    vec![Prompt::Concise, Prompt::Detailed]
}
