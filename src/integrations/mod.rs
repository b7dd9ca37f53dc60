//! Language model clients.
//!
//! Provides clients for:
//! - Google Gemini (generateContent)
//! - Ollama (local LLM)

pub mod gemini;
pub mod ollama;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{LlmConfig, LlmProvider};
use crate::Result;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

/// Stateless prompt-in, text-out completion.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Model name for logs.
    fn name(&self) -> &str;
}

/// Build the client selected in the configuration.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider {
        LlmProvider::Gemini => {
            let mut client = GeminiClient::new(config.api_key.clone(), &config.model)?
                .with_temperature(config.temperature);
            if let Some(url) = &config.base_url {
                client = client.with_base_url(url);
            }
            Ok(Arc::new(client))
        }
        LlmProvider::Ollama => {
            let url = config.base_url.as_deref().unwrap_or(ollama::OLLAMA_URL);
            let model = if config.model.starts_with("gemini") {
                ollama::DEFAULT_MODEL
            } else {
                config.model.as_str()
            };
            Ok(Arc::new(
                OllamaClient::with_url(url, model)?.with_temperature(config.temperature),
            ))
        }
    }
}
