//! Build the vector index from the documentation PDFs

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::index::{IndexStats, Indexer};

/// Run the indexing pipeline and print a summary.
pub async fn run(config: &Config) -> Result<IndexStats> {
    println!(
        "📚 Indexing PDFs from {} ({} backend)",
        config.index.docs_dir.display(),
        config.index.backend.as_str()
    );

    let indexer = Indexer::from_config(config)?;
    let stats = indexer.run().await?;

    info!(chunks = stats.chunks, "Indexing complete");
    println!("{}", render_stats(&stats));
    Ok(stats)
}

pub fn render_stats(stats: &IndexStats) -> String {
    let mut out = String::from("✅ Indexing complete\n");
    out.push_str(&format!("  Documents:          {}\n", stats.documents));
    out.push_str(&format!("  Pages:              {}\n", stats.pages));
    out.push_str(&format!("  Chunks:             {}\n", stats.chunks));
    out.push_str(&format!("  Images extracted:   {}\n", stats.images));
    out.push_str(&format!("  Chunks with images: {}\n", stats.chunks_with_images));
    if !stats.sections.is_empty() {
        out.push_str("  Pages by section:\n");
        for (section, count) in &stats.sections {
            out.push_str(&format!("    {:<18} {}\n", section.as_str(), count));
        }
    }
    out
}
