//! Configuration for the stores, the language model and retrieval tuning
//!
//! Loads configuration from config.yml file

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::{Error, Result};

/// Default constants (fallback if config.yml not found)
pub const CONFIG_FILE: &str = "config.yml";
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_NEO4J_URI: &str = "bolt://127.0.0.1:7687";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "corporate_chunks";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_PDF_DIRECTORY: &str = "data/raw_pdfs";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MIN_SCORE: f32 = 0.3;
pub const DEFAULT_REDUNDANCY_THRESHOLD: f32 = 0.9;
/// Lower bound for the redundancy threshold; below it unrelated evidence that
/// shares a few words would collapse into one item.
pub const MIN_REDUNDANCY_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which language model backend answers prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "ollama" | "local" => LlmProvider::Ollama,
            _ => LlmProvider::Gemini,
        }
    }
}

/// Storage backend for either store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Neo4j for the graph, Qdrant for vectors
    Remote,
    /// In-process store, nothing persisted
    Memory,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "memory" | "in-memory" | "inmemory" => StoreBackend::Memory,
            _ => StoreBackend::Remote,
        }
    }
}

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    llm: Option<LlmSection>,
    graph: Option<GraphSection>,
    vector: Option<VectorSection>,
    retrieval: Option<RetrievalSection>,
    ingestion: Option<IngestionSection>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphSection {
    backend: Option<String>,
    uri: Option<String>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VectorSection {
    backend: Option<String>,
    url: Option<String>,
    collection: Option<String>,
    embedding_model: Option<String>,
    embedding_dim: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrievalSection {
    top_k: Option<usize>,
    min_score: Option<f32>,
    redundancy_threshold: Option<f32>,
    min_confidence: Option<f32>,
    max_context_items: Option<usize>,
    graph_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct IngestionSection {
    pdf_directory: Option<String>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
}

/// Language model settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub temperature: f32,
}

/// Entity store connection settings.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub backend: StoreBackend,
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Semantic store connection settings.
#[derive(Debug, Clone)]
pub struct VectorConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub collection: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
}

/// Router tuning knobs.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Chunks requested from the semantic store
    pub top_k: usize,
    /// Chunks scoring below this are discarded
    pub min_score: f32,
    /// Jaccard similarity at which two evidence items count as duplicates
    pub redundancy_threshold: f32,
    /// Classifier margin required before committing to factual/semantic
    pub min_confidence: f32,
    /// Evidence items passed to the synthesis prompt
    pub max_context_items: usize,
    /// Records requested from the entity store
    pub graph_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: DEFAULT_MIN_SCORE,
            redundancy_threshold: DEFAULT_REDUNDANCY_THRESHOLD,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_context_items: 8,
            graph_limit: 10,
        }
    }
}

/// PDF ingestion settings.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub pdf_directory: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub graph: GraphConfig,
    pub vector: VectorConfig,
    pub retrieval: RetrievalConfig,
    pub ingestion: IngestionConfig,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    /// Environment variables take precedence over config.yml values
    pub fn new() -> Self {
        Self::load_from_file(CONFIG_FILE)
            .or_else(|_| Self::load_from_file(format!("../{CONFIG_FILE}")))
            .unwrap_or_else(|_| Self::from_yaml(YamlConfig::default()))
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> String {
        if let Some(ref v) = value {
            if let Some(var_name) = placeholder(v) {
                if let Ok(env_val) = std::env::var(var_name) {
                    return env_val;
                }
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            return env_val;
        }
        match value {
            Some(v) if placeholder(&v).is_some() => String::new(),
            Some(v) => v,
            None => String::new(),
        }
    }

    /// Same as [`Self::resolve_env_string`] but with a default for empty results.
    fn resolve_or(value: Option<String>, env_key: &str, default: &str) -> String {
        let resolved = Self::resolve_env_string(value, env_key);
        if resolved.trim().is_empty() {
            default.to_string()
        } else {
            resolved
        }
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(Self::from_yaml(yaml))
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let llm = yaml.llm.unwrap_or_default();
        let graph = yaml.graph.unwrap_or_default();
        let vector = yaml.vector.unwrap_or_default();
        let retrieval = yaml.retrieval.unwrap_or_default();
        let ingestion = yaml.ingestion.unwrap_or_default();
        let defaults = RetrievalConfig::default();

        Self {
            llm: LlmConfig {
                provider: LlmProvider::parse(&Self::resolve_env_string(
                    llm.provider,
                    "LLM_PROVIDER",
                )),
                model: Self::resolve_or(llm.model, "LLM_MODEL_NAME", DEFAULT_LLM_MODEL),
                api_key: Self::resolve_env_string(llm.api_key, "GOOGLE_API_KEY"),
                base_url: Some(Self::resolve_env_string(llm.base_url, "LLM_BASE_URL"))
                    .filter(|url| !url.trim().is_empty()),
                temperature: llm.temperature.unwrap_or(0.2),
            },
            graph: GraphConfig {
                backend: StoreBackend::parse(&Self::resolve_env_string(
                    graph.backend,
                    "GRAPH_BACKEND",
                )),
                uri: Self::resolve_or(graph.uri, "NEO4J_URI", DEFAULT_NEO4J_URI),
                user: Self::resolve_or(graph.user, "NEO4J_USERNAME", "neo4j"),
                password: Self::resolve_env_string(graph.password, "NEO4J_PASSWORD"),
                database: Self::resolve_or(graph.database, "NEO4J_DATABASE", "neo4j"),
            },
            vector: VectorConfig {
                backend: StoreBackend::parse(&Self::resolve_env_string(
                    vector.backend,
                    "VECTOR_BACKEND",
                )),
                url: Self::resolve_or(vector.url, "QDRANT_URL", DEFAULT_QDRANT_URL),
                collection: vector
                    .collection
                    .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
                embedding_model: Self::resolve_or(
                    vector.embedding_model,
                    "EMBEDDING_MODEL_NAME",
                    DEFAULT_EMBEDDING_MODEL,
                ),
                embedding_dim: vector.embedding_dim.unwrap_or(256),
            },
            retrieval: RetrievalConfig {
                top_k: retrieval.top_k.unwrap_or(defaults.top_k).max(1),
                min_score: retrieval
                    .min_score
                    .unwrap_or(defaults.min_score)
                    .clamp(0.0, 1.0),
                redundancy_threshold: retrieval
                    .redundancy_threshold
                    .unwrap_or(defaults.redundancy_threshold)
                    .clamp(MIN_REDUNDANCY_THRESHOLD, 1.0),
                min_confidence: retrieval
                    .min_confidence
                    .unwrap_or(defaults.min_confidence)
                    .clamp(0.0, 1.0),
                max_context_items: retrieval
                    .max_context_items
                    .unwrap_or(defaults.max_context_items)
                    .max(1),
                graph_limit: retrieval.graph_limit.unwrap_or(defaults.graph_limit).max(1),
            },
            ingestion: IngestionConfig {
                pdf_directory: Self::resolve_or(
                    ingestion.pdf_directory,
                    "PDF_DIRECTORY",
                    DEFAULT_PDF_DIRECTORY,
                ),
                chunk_size: ingestion.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
                chunk_overlap: ingestion.chunk_overlap.unwrap_or(DEFAULT_CHUNK_OVERLAP),
            },
            request_timeout: Duration::from_secs(
                yaml.request_timeout_secs
                    .unwrap_or(DEFAULT_TIMEOUT_SECS)
                    .max(1),
            ),
        }
    }

    /// Check that every credential the selected backends need is present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();

        if self.llm.provider == LlmProvider::Gemini && self.llm.api_key.trim().is_empty() {
            missing.push("GOOGLE_API_KEY");
        }
        if self.graph.backend == StoreBackend::Remote && self.graph.password.trim().is_empty() {
            missing.push("NEO4J_PASSWORD");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "missing credentials: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Extract `VAR` from a `${VAR}` placeholder.
fn placeholder(value: &str) -> Option<&str> {
    if value.starts_with("${") && value.ends_with('}') && value.len() > 3 {
        Some(&value[2..value.len() - 1])
    } else {
        None
    }
}
