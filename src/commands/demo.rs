//! Ask a fixed set of typical migration questions

use anyhow::Result;

use super::render_answer;
use crate::config::Config;
use crate::rag::{Answer, Assistant};

pub const DEMO_QUESTIONS: [&str; 3] = [
    "How do I convert a JavaDelegate into a Camunda 8 job worker?",
    "What are the main steps to migrate a process from Camunda 7 to Camunda 8?",
    "Which BPMN elements are not supported in Camunda 8 and how do I replace them?",
];

pub async fn run(config: &Config) -> Result<Vec<Answer>> {
    let assistant = Assistant::from_config(config).await?;
    println!("🚀 {}\n", assistant.describe());

    let mut answers = Vec::with_capacity(DEMO_QUESTIONS.len());
    for (i, question) in DEMO_QUESTIONS.iter().enumerate() {
        println!("{}", "=".repeat(80));
        println!("❓ Question {}/{}: {}\n", i + 1, DEMO_QUESTIONS.len(), question);
        let answer = assistant.ask(question).await;
        println!("{}", render_answer(&answer));
        answers.push(answer);
    }
    println!("{}", "=".repeat(80));

    Ok(answers)
}
