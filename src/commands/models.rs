//! List Gemini models that can generate content

use anyhow::Result;

use crate::config::Config;
use crate::integrations::{GeminiClient, ModelInfo};

pub async fn run(config: &Config) -> Result<Vec<ModelInfo>> {
    let client = GeminiClient::new(config.require_google_key()?, &config.model)?;
    let models = client.list_generation_models().await?;

    println!("🔎 {} models support generateContent:", models.len());
    for model in &models {
        let name = model.name.trim_start_matches("models/");
        if model.display_name.is_empty() {
            println!("  - {}", name);
        } else {
            println!("  - {} ({})", name, model.display_name);
        }
    }
    Ok(models)
}
