//! Migration Assistant CLI - main entry point
//!
//! Index the migration PDFs, then ask questions from the terminal or the web chat.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use migration_assistant::commands::{self, serve::DEFAULT_ADDR, ServeConfig};
use migration_assistant::{metrics, Config, Prompt};
use tracing::warn;

#[derive(Parser)]
#[command(name = "migration_assistant")]
#[command(about = "Camunda 7 → 8 migration assistant grounded in the official PDFs", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Configuration file (defaults to ./config.yml, then ../config.yml)
    #[arg(long, short, env = "MIGRATION_ASSISTANT_CONFIG")]
    config: Option<PathBuf>,

    /// System prompt: concise | detailed
    #[arg(long)]
    prompt: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, chunk and embed the PDFs into the vector index
    Index {
        /// Documentation directory (overrides config)
        #[arg(long)]
        docs_dir: Option<PathBuf>,
    },

    /// Interactive terminal chat
    Chat,

    /// Ask a single question
    Ask {
        /// The question to answer
        question: String,

        /// Print the answer as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Web chat UI
    Serve {
        /// Listen address
        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: SocketAddr,
    },

    /// List Gemini models that support generateContent
    Models,

    /// Check keys, documents, index and image catalog
    Doctor,

    /// Ask three typical migration questions
    Demo,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Index { .. } => "index",
            Commands::Chat => "chat",
            Commands::Ask { .. } => "ask",
            Commands::Serve { .. } => "serve",
            Commands::Models => "models",
            Commands::Doctor => "doctor",
            Commands::Demo => "demo",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("migration_assistant=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load_from_file(path)?,
        None => Config::new(),
    };
    if let Some(prompt) = cli.prompt.as_deref() {
        config.prompt = Prompt::parse(prompt);
    }

    let command_name = cli.command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(cli.command, config).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(command: Commands, mut config: Config) -> anyhow::Result<()> {
    match command {
        Commands::Index { docs_dir } => {
            if let Some(dir) = docs_dir {
                config.index.docs_dir = dir;
            }
            commands::index::run(&config).await?;
        }
        Commands::Chat => {
            commands::chat::run(&config).await?;
        }
        Commands::Ask { question, json } => {
            commands::ask::run(&config, &question, json).await?;
        }
        Commands::Serve { addr } => {
            let serve = ServeConfig::new(addr, &config);
            commands::serve::run(&config, serve).await?;
        }
        Commands::Models => {
            commands::models::run(&config).await?;
        }
        Commands::Doctor => {
            commands::doctor::run(&config).await?;
        }
        Commands::Demo => {
            commands::demo::run(&config).await?;
        }
    }

    Ok(())
}
