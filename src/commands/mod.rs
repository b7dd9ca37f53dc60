//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod ask;
pub mod ingest;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::integrations::{self, LanguageModel};
use crate::router::Router;
use crate::stores::{self, EntityStore, SemanticStore};

pub use ask::{chat_loop, format_answer, run_ask, run_chat, FAILURE_MESSAGE, FALLBACK_NOTICE};
pub use ingest::run as ingest_run;

/// Store and model handles opened once at startup.
#[derive(Clone)]
pub struct Services {
    pub entity: Arc<dyn EntityStore>,
    pub semantic: Arc<dyn SemanticStore>,
    pub llm: Arc<dyn LanguageModel>,
}

impl Services {
    /// Validate credentials and open every backend the configuration selects.
    pub async fn connect(config: &Config) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let llm = integrations::from_config(&config.llm).context("failed to create LLM client")?;
        let entity = stores::open_entity_store(config)
            .await
            .context("failed to open entity store")?;
        let semantic = stores::open_semantic_store(config)
            .await
            .context("failed to open semantic store")?;

        info!(model = llm.name(), "Services ready");
        Ok(Self {
            entity,
            semantic,
            llm,
        })
    }

    pub fn router(&self, config: &Config) -> Router {
        Router::from_config(
            config,
            self.entity.clone(),
            self.semantic.clone(),
            self.llm.clone(),
        )
    }
}
