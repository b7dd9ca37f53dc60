//! corporate_rag CLI - main entry point
//!
//! Ingest PDFs into the entity and semantic stores, then ask questions.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use anyhow::Context;
use corporate_rag::commands::{self, Services};
use corporate_rag::{config::CONFIG_FILE, metrics, Config};
use tracing::warn;

#[derive(Parser)]
#[command(name = "corporate_rag")]
#[command(about = "Question answering over corporate PDF documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration
    #[arg(long, env = "CORPORATE_RAG_CONFIG", default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract PDFs into the graph and vector stores
    Ingest {
        /// Directory with PDF files (defaults to ingestion.pdf_directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Clear both stores first
        #[arg(long, default_value_t = false)]
        fresh: bool,
    },

    /// Answer a single question
    Ask {
        /// Question text
        question: String,
    },

    /// Interactive question loop; type 'exit' to quit
    Chat,

    /// Ingest, then start the interactive loop
    Run {
        /// Clear both stores before ingesting
        #[arg(long, default_value_t = false)]
        fresh: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ingest { .. } => "ingest",
            Commands::Ask { .. } => "ask",
            Commands::Chat => "chat",
            Commands::Run { .. } => "run",
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        Config::load_from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))
    } else {
        warn!(path = %path.display(), "Config file not found, using defaults and environment");
        Ok(Config::new())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("corporate_rag=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let config = load_config(&cli.config)?;

    let command_name = cli.command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(&config, cli.command).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(config: &Config, command: Commands) -> anyhow::Result<()> {
    let services = Services::connect(config).await?;

    match command {
        Commands::Ingest { dir, fresh } => {
            commands::ingest::run(config, &services, dir, fresh).await?;
        }
        Commands::Ask { question } => {
            commands::run_ask(config, &services, &question).await?;
        }
        Commands::Chat => {
            commands::run_chat(config, &services).await?;
        }
        Commands::Run { fresh } => {
            commands::ingest::run(config, &services, None, fresh).await?;
            commands::run_chat(config, &services).await?;
        }
    }

    Ok(())
}
