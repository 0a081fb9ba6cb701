//! Interactive terminal chat

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use super::render_answer;
use crate::config::Config;
use crate::rag::Assistant;

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";

/// What a line typed at the prompt means.
#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput<'a> {
    Exit,
    Clear,
    Empty,
    Question(&'a str),
}

pub fn parse_input(line: &str) -> ChatInput<'_> {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "" => ChatInput::Empty,
        "sair" | "exit" | "quit" => ChatInput::Exit,
        "limpar" | "clear" => ChatInput::Clear,
        _ => ChatInput::Question(line),
    }
}

fn print_banner(assistant: &Assistant) {
    println!("🤖 Camunda 7 → 8 Migration Assistant");
    println!("{}", assistant.describe());
    println!("Commands:");
    println!("  sair | exit | quit - leave");
    println!("  limpar | clear     - clear the screen");
    println!();
}

pub async fn run(config: &Config) -> Result<()> {
    let assistant = Assistant::from_config(config).await?;
    print_banner(&assistant);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("❓ Your question: ");
        std::io::stdout().flush().ok();

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break, // EOF
        };

        match parse_input(&line) {
            ChatInput::Empty => continue,
            ChatInput::Exit => {
                println!("👋 Goodbye!");
                break;
            }
            ChatInput::Clear => {
                print!("{}", CLEAR_SCREEN);
                print_banner(&assistant);
            }
            ChatInput::Question(question) => {
                println!("\n🤔 Searching the documentation...\n");
                let answer = assistant.ask(question).await;
                debug!(status = answer.status.as_str(), "Answer ready");
                println!("{}", render_answer(&answer));
                println!("{}", "-".repeat(80));
                println!();
            }
        }
    }

    Ok(())
}
