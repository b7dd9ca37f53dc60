//! Query routing and retrieval orchestration
//!
//! The router classifies a question, consults the entity store and the
//! semantic store according to the intent, deduplicates and orders the
//! evidence, and asks the language model for the final answer. When neither
//! store contributes evidence the model answers on its own and the result is
//! labelled `llm_fallback`.
//!
//! Store failures never surface from [`Router::answer`]; they are logged,
//! counted and treated as "no evidence from that source". A failed or timed
//! out completion is a [`Error::Synthesis`].

pub mod classify;
pub mod dedup;
pub mod evidence;
pub mod prompt;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{Config, RetrievalConfig};
use crate::integrations::LanguageModel;
use crate::metrics;
use crate::stores::models::EntityPattern;
use crate::stores::{EntityStore, SemanticStore};
use crate::{Error, Result};

pub use classify::{Classification, Intent, IntentClassifier, KeywordClassifier};
pub use dedup::dedup;
pub use evidence::{AnswerResult, EvidenceItem, EvidenceSource, Provenance, Question, Strategy};

/// Outcome of one store lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Hit,
    Miss,
}

impl Lookup {
    fn of(items: &[EvidenceItem]) -> Self {
        if items.is_empty() {
            Lookup::Miss
        } else {
            Lookup::Hit
        }
    }
}

/// Per-request progress, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Classified,
    GraphQueried(Lookup),
    VectorQueried(Lookup),
    Synthesized,
    Done,
    Failed,
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = ?*stage, to = ?next, "Router stage");
    *stage = next;
}

/// Orders evidence for the prompt: graph before vector, best score first
/// within each source. Stable, so ties keep retrieval order.
fn order_evidence(mut evidence: Vec<EvidenceItem>, limit: usize) -> Vec<EvidenceItem> {
    evidence.sort_by(|a, b| {
        source_rank(a.source)
            .cmp(&source_rank(b.source))
            .then_with(|| b.rank().total_cmp(&a.rank()))
    });
    evidence.truncate(limit);
    evidence
}

fn source_rank(source: EvidenceSource) -> u8 {
    match source {
        EvidenceSource::Graph => 0,
        EvidenceSource::Vector => 1,
        EvidenceSource::Llm => 2,
    }
}

/// Retrieval router over injected store and model handles.
pub struct Router {
    entity: Arc<dyn EntityStore>,
    semantic: Arc<dyn SemanticStore>,
    llm: Arc<dyn LanguageModel>,
    classifier: Box<dyn IntentClassifier>,
    retrieval: RetrievalConfig,
    timeout: Duration,
}

impl Router {
    pub fn new(
        entity: Arc<dyn EntityStore>,
        semantic: Arc<dyn SemanticStore>,
        llm: Arc<dyn LanguageModel>,
        retrieval: RetrievalConfig,
        timeout: Duration,
    ) -> Self {
        let classifier = Box::new(KeywordClassifier::new(retrieval.min_confidence));
        Self {
            entity,
            semantic,
            llm,
            classifier,
            retrieval,
            timeout,
        }
    }

    /// Router with tuning and timeout taken from the configuration.
    pub fn from_config(
        config: &Config,
        entity: Arc<dyn EntityStore>,
        semantic: Arc<dyn SemanticStore>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self::new(
            entity,
            semantic,
            llm,
            config.retrieval.clone(),
            config.request_timeout,
        )
    }

    /// Replace the default keyword classifier.
    pub fn with_classifier(mut self, classifier: Box<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn retrieval(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    /// Answer one question.
    pub async fn answer(&self, question: &Question) -> Result<AnswerResult> {
        let mut stage = Stage::Received;

        let text = question.text().trim();
        if text.is_empty() {
            advance(&mut stage, Stage::Failed);
            return Err(Error::InvalidInput("question is empty".to_string()));
        }

        let classification = self.classifier.classify(text);
        advance(&mut stage, Stage::Classified);
        info!(
            intent = classification.intent.as_str(),
            confidence = classification.confidence,
            keywords = ?classification.pattern.keywords,
            "Classified question"
        );

        let pattern = &classification.pattern;
        let (graph, vector) = match classification.intent {
            Intent::Factual => {
                let graph = self.graph_evidence(pattern, &mut stage).await;
                let vector = if graph.is_empty() {
                    self.vector_evidence(text, &mut stage).await
                } else {
                    debug!("Graph answered a factual question, skipping semantic search");
                    Vec::new()
                };
                (graph, vector)
            }
            Intent::Semantic => {
                let vector = self.vector_evidence(text, &mut stage).await;
                let graph = self.graph_evidence(pattern, &mut stage).await;
                (graph, vector)
            }
            Intent::Unknown => {
                let graph = self.graph_evidence(pattern, &mut stage).await;
                let vector = self.vector_evidence(text, &mut stage).await;
                (graph, vector)
            }
        };

        let retrieved = graph.len() + vector.len();
        let merged: Vec<EvidenceItem> = graph.into_iter().chain(vector).collect();
        let unique = dedup(merged, self.retrieval.redundancy_threshold);
        let evidence = order_evidence(unique, self.retrieval.max_context_items);
        debug!(retrieved, kept = evidence.len(), "Merged evidence");

        let (prompt, strategy) = if evidence.is_empty() {
            info!("No evidence found, answering from general knowledge");
            (prompt::fallback_prompt(question), Strategy::LlmFallback)
        } else {
            (
                prompt::synthesis_prompt(question, &evidence),
                Strategy::from_evidence(&evidence),
            )
        };

        let answer = match self.complete(&prompt).await {
            Ok(answer) => answer,
            Err(err) => {
                advance(&mut stage, Stage::Failed);
                warn!(strategy = strategy.as_str(), "Synthesis failed: {}", err);
                return Err(err);
            }
        };
        advance(&mut stage, Stage::Synthesized);

        metrics::record_answer(strategy.as_str());
        info!(
            strategy = strategy.as_str(),
            evidence = evidence.len(),
            "Answered question"
        );
        advance(&mut stage, Stage::Done);

        Ok(AnswerResult::new(answer, evidence, strategy))
    }

    async fn graph_evidence(&self, pattern: &EntityPattern, stage: &mut Stage) -> Vec<EvidenceItem> {
        let evidence = if pattern.is_empty() {
            debug!("No keywords for graph lookup");
            Vec::new()
        } else {
            let lookup = self
                .entity
                .query_entities(pattern, self.retrieval.graph_limit);
            self.bounded("graph", lookup)
                .await
                .map(|records| records.iter().map(EvidenceItem::from_record).collect())
                .unwrap_or_default()
        };
        advance(stage, Stage::GraphQueried(Lookup::of(&evidence)));
        evidence
    }

    async fn vector_evidence(&self, query: &str, stage: &mut Stage) -> Vec<EvidenceItem> {
        let min_score = self.retrieval.min_score;
        let search = self
            .semantic
            .search(query, self.retrieval.top_k, min_score);
        let evidence: Vec<EvidenceItem> = self
            .bounded("vector", search)
            .await
            .map(|hits| {
                hits.iter()
                    .filter(|hit| hit.score >= min_score)
                    .map(EvidenceItem::from_hit)
                    .collect()
            })
            .unwrap_or_default();
        advance(stage, Stage::VectorQueried(Lookup::of(&evidence)));
        evidence
    }

    /// Run a store call under the request timeout. Failures are logged and
    /// counted, then reported as `None`.
    async fn bounded<T>(
        &self,
        store: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Option<T> {
        let failure = match timeout(self.timeout, call).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(err)) => Error::store_unavailable(store, err.to_string()),
            Err(_) => Error::store_unavailable(
                store,
                format!("timed out after {}ms", self.timeout.as_millis()),
            ),
        };
        warn!("{}", failure);
        metrics::record_store_failure(store);
        None
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        match timeout(self.timeout, self.llm.complete(prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(Ok(_)) => Err(Error::Synthesis(format!(
                "{} returned an empty answer",
                self.llm.name()
            ))),
            Ok(Err(err)) => Err(Error::Synthesis(err.to_string())),
            Err(_) => Err(Error::Synthesis(format!(
                "{} timed out after {}ms",
                self.llm.name(),
                self.timeout.as_millis()
            ))),
        }
    }
}
