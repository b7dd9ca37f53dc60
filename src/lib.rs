//! Corporate document question answering
//!
//! This library provides:
//! - A retrieval router that classifies questions and combines graph lookups,
//!   vector similarity search and a language-model fallback
//! - Evidence deduplication and ordering with provenance
//! - PDF ingestion with LLM entity extraction into Neo4j and Qdrant
//! - In-memory stores for offline use and tests
//! - Prometheus metrics for commands and routing decisions

pub mod commands;
pub mod config;
pub mod error;
pub mod ingest;
pub mod integrations;
pub mod metrics;
pub mod prompts;
pub mod router;
pub mod stores;

// Re-export common types
pub use config::Config;
pub use error::{Error, Result};
pub use integrations::{GeminiClient, LanguageModel, OllamaClient};
pub use prompts::{load_prompt, Prompt};
pub use router::{AnswerResult, EvidenceItem, EvidenceSource, Question, Router, Strategy};
