//! Environment diagnostics: keys, documents, index and image catalog

use anyhow::Result;
use serde::Serialize;

use crate::config::{Config, EmbeddingProvider, LlmProvider};
use crate::index::{discover_pdfs, VectorStore};
use crate::pdf::ImageCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckLevel {
    Ok,
    Warn,
    Fail,
}

impl CheckLevel {
    fn icon(&self) -> &'static str {
        match self {
            CheckLevel::Ok => "✅",
            CheckLevel::Warn => "⚠️ ",
            CheckLevel::Fail => "❌",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub level: CheckLevel,
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, level: CheckLevel, detail: impl Into<String>) -> Self {
        Self {
            name,
            level,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DoctorReport {
    pub checks: Vec<Check>,
}

impl DoctorReport {
    pub fn failures(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.level == CheckLevel::Fail)
            .count()
    }

    pub fn get(&self, name: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn render(&self) -> String {
        let mut out = String::from("🩺 Migration assistant diagnostics\n");
        for check in &self.checks {
            out.push_str(&format!(
                "  {} {:<16} {}\n",
                check.level.icon(),
                check.name,
                check.detail
            ));
        }
        out
    }
}

fn key_check(name: &'static str, value: Option<&str>, required: bool, purpose: &str) -> Check {
    match (value, required) {
        (Some(_), _) => Check::new(name, CheckLevel::Ok, format!("set ({})", purpose)),
        (None, true) => Check::new(name, CheckLevel::Fail, format!("missing, required for {}", purpose)),
        (None, false) => Check::new(name, CheckLevel::Warn, format!("not set ({})", purpose)),
    }
}

/// Collect every check without failing fast.
pub async fn diagnose(config: &Config) -> DoctorReport {
    let mut report = DoctorReport::default();
    let checks = &mut report.checks;

    match config.validate() {
        Ok(()) => checks.push(Check::new("config", CheckLevel::Ok, "valid")),
        Err(e) => checks.push(Check::new("config", CheckLevel::Fail, e.to_string())),
    }

    let provider = config.effective_llm_provider();
    let needs_google = provider == LlmProvider::Gemini
        || config.index.embedding_provider == EmbeddingProvider::Gemini;
    checks.push(key_check(
        "GOOGLE_API_KEY",
        config.google_api_key.as_deref(),
        needs_google,
        "Gemini generation and embeddings",
    ));
    checks.push(key_check(
        "COHERE_API_KEY",
        config.cohere_api_key.as_deref(),
        false,
        "reranking; retrieval order is used without it",
    ));
    if config.llm_provider == LlmProvider::Groq {
        checks.push(key_check(
            "GROQ_API_KEY",
            config.groq_api_key.as_deref(),
            false,
            "Groq generation",
        ));
    }
    if config.index.embedding_provider == EmbeddingProvider::OpenAi {
        checks.push(key_check(
            "OPENAI_API_KEY",
            config.openai_api_key.as_deref(),
            true,
            "OpenAI embeddings",
        ));
    }

    match discover_pdfs(&config.index.docs_dir) {
        Ok(pdfs) if pdfs.is_empty() => checks.push(Check::new(
            "documents",
            CheckLevel::Fail,
            format!("no PDF files in {}", config.index.docs_dir.display()),
        )),
        Ok(pdfs) => checks.push(Check::new(
            "documents",
            CheckLevel::Ok,
            format!("{} PDF files in {}", pdfs.len(), config.index.docs_dir.display()),
        )),
        Err(e) => checks.push(Check::new("documents", CheckLevel::Fail, e.to_string())),
    }

    let index = match VectorStore::open(&config.index).await {
        Ok(store) => store.stats().await,
        Err(e) => Err(e),
    };
    match index {
        Ok(stats) if stats.chunks == 0 => checks.push(Check::new(
            "index",
            CheckLevel::Warn,
            format!("{} index at {} is empty", stats.backend, stats.location),
        )),
        Ok(stats) => checks.push(Check::new(
            "index",
            CheckLevel::Ok,
            format!("{} chunks ({} at {})", stats.chunks, stats.backend, stats.location),
        )),
        Err(e) => checks.push(Check::new(
            "index",
            CheckLevel::Fail,
            format!("{:#}; run `migration_assistant index`", e),
        )),
    }

    match ImageCatalog::load(&config.index.image_metadata) {
        Ok(catalog) if catalog.is_empty() => checks.push(Check::new(
            "image catalog",
            CheckLevel::Warn,
            format!("no images recorded in {}", config.index.image_metadata.display()),
        )),
        Ok(catalog) => checks.push(Check::new(
            "image catalog",
            CheckLevel::Ok,
            format!("{} images", catalog.len()),
        )),
        Err(e) => checks.push(Check::new("image catalog", CheckLevel::Fail, e.to_string())),
    }

    report
}

pub async fn run(config: &Config) -> Result<DoctorReport> {
    let report = diagnose(config).await;
    println!("{}", report.render());

    let failures = report.failures();
    anyhow::ensure!(failures == 0, "{} check(s) failed", failures);
    Ok(report)
}
