//! Question, evidence and answer types

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::stores::models::{ChunkHit, EntityRecord};

/// Raw user question. Validated by the router, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    text: String,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Mechanism that produced a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceSource {
    Graph,
    Vector,
    Llm,
}

impl EvidenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceSource::Graph => "graph",
            EvidenceSource::Vector => "vector",
            EvidenceSource::Llm => "llm",
        }
    }
}

/// Where an evidence item came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    GraphNode { node_id: String },
    Chunk { chunk_id: Uuid, document: String },
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::GraphNode { node_id } => write!(f, "graph node {node_id}"),
            Provenance::Chunk { chunk_id, document } => write!(f, "{document} (chunk {chunk_id})"),
        }
    }
}

/// One retrieved piece of content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceItem {
    pub source: EvidenceSource,
    pub content: String,
    /// Relevance in `[0, 1]`
    pub score: Option<f32>,
    pub provenance: Option<Provenance>,
}

impl EvidenceItem {
    pub fn from_record(record: &EntityRecord) -> Self {
        Self {
            source: EvidenceSource::Graph,
            content: record.render(),
            score: Some(record.relevance.clamp(0.0, 1.0)),
            provenance: Some(Provenance::GraphNode {
                node_id: record.node_id.clone(),
            }),
        }
    }

    pub fn from_hit(hit: &ChunkHit) -> Self {
        Self {
            source: EvidenceSource::Vector,
            content: hit.content.trim().to_string(),
            score: Some(hit.score.clamp(0.0, 1.0)),
            provenance: Some(Provenance::Chunk {
                chunk_id: hit.chunk_id,
                document: hit.document.clone(),
            }),
        }
    }

    /// Score used for ordering; unscored items sort last.
    pub fn rank(&self) -> f32 {
        self.score.unwrap_or(0.0)
    }
}

/// Retrieval strategy that produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Strategy {
    #[serde(rename = "graph")]
    Graph,
    #[serde(rename = "vector")]
    Vector,
    #[serde(rename = "graph+vector")]
    GraphAndVector,
    #[serde(rename = "llm_fallback")]
    LlmFallback,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Graph => "graph",
            Strategy::Vector => "vector",
            Strategy::GraphAndVector => "graph+vector",
            Strategy::LlmFallback => "llm_fallback",
        }
    }

    /// Strategy implied by the sources present in the final evidence.
    pub fn from_evidence(evidence: &[EvidenceItem]) -> Self {
        let graph = evidence.iter().any(|e| e.source == EvidenceSource::Graph);
        let vector = evidence.iter().any(|e| e.source == EvidenceSource::Vector);
        match (graph, vector) {
            (true, true) => Strategy::GraphAndVector,
            (true, false) => Strategy::Graph,
            (false, true) => Strategy::Vector,
            (false, false) => Strategy::LlmFallback,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final answer with the evidence that grounded it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResult {
    text: String,
    evidence: Vec<EvidenceItem>,
    strategy: Strategy,
}

impl AnswerResult {
    pub(crate) fn new(text: String, evidence: Vec<EvidenceItem>, strategy: Strategy) -> Self {
        Self {
            text,
            evidence,
            strategy,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Items included in the synthesis prompt, in prompt order.
    pub fn evidence(&self) -> &[EvidenceItem] {
        &self.evidence
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn is_fallback(&self) -> bool {
        self.strategy == Strategy::LlmFallback
    }
}
