//! One-shot question

use anyhow::Result;

use super::render_answer;
use crate::config::Config;
use crate::error::Error;
use crate::rag::{Answer, Assistant};

/// Answer a single question and print it as text or JSON.
pub async fn run(config: &Config, question: &str, json: bool) -> Result<Answer> {
    let question = question.trim();
    if question.is_empty() {
        return Err(Error::InvalidArgument("question must not be empty".to_string()).into());
    }

    let assistant = Assistant::from_config(config).await?;
    let answer = assistant.ask(question).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        println!("{}", render_answer(&answer));
    }
    Ok(answer)
}
