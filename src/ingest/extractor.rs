//! LLM-driven entity and relationship extraction.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::schema::ExtractionResult;
use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::integrations::LanguageModel;
use crate::prompts::{self, Prompt};
use crate::{Error, Result};

/// Pull the JSON object out of a completion. Models often wrap it in a
/// Markdown fence or add a sentence before it.
pub fn json_payload(completion: &str) -> Option<&str> {
    let start = completion.find('{')?;
    let end = completion.rfind('}')?;
    (end > start).then(|| &completion[start..=end])
}

/// Parse a completion into an extraction result.
pub fn parse_extraction(completion: &str) -> Result<ExtractionResult> {
    let payload = json_payload(completion).ok_or_else(|| {
        Error::SerializationError("no JSON object in extraction output".to_string())
    })?;
    Ok(serde_json::from_str(payload)?)
}

pub struct EntityExtractor {
    llm: Arc<dyn LanguageModel>,
    template: String,
    timeout: Duration,
}

impl EntityExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            template: Prompt::Extraction.load_or_default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Upper bound for one extraction call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn prompt_for(&self, text: &str) -> String {
        prompts::render(&self.template, &[("text", text)])
    }

    /// Extract entities from one chunk.
    pub async fn try_extract(&self, text: &str) -> Result<ExtractionResult> {
        let prompt = self.prompt_for(text);
        let completion = tokio::time::timeout(self.timeout, self.llm.complete(&prompt))
            .await
            .map_err(|_| {
                Error::LlmError(format!(
                    "{} extraction timed out after {:?}",
                    self.llm.name(),
                    self.timeout
                ))
            })??;
        let result = parse_extraction(&completion)?;
        debug!(
            companies = result.companies.len(),
            persons = result.persons.len(),
            relationships = result.relationships.len(),
            "Parsed extraction"
        );
        Ok(result)
    }

    /// Same as [`Self::try_extract`], but a failure yields an empty result so
    /// one bad chunk does not stop ingestion.
    pub async fn extract(&self, text: &str) -> ExtractionResult {
        if text.trim().is_empty() {
            return ExtractionResult::default();
        }
        match self.try_extract(text).await {
            Ok(result) => result,
            Err(err) => {
                warn!("Extraction error: {}", err);
                ExtractionResult::default()
            }
        }
    }
}
