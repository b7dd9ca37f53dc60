//! Error types for the retrieval engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Question text was empty or otherwise unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A store call failed or timed out. Recovered inside the router.
    #[error("{store} store unavailable: {reason}")]
    StoreUnavailable { store: &'static str, reason: String },

    /// The language model failed on the final synthesis step.
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// Extracted record does not match the accepted graph schema.
    #[error("Schema skip: {0}")]
    SchemaSkip(String),

    #[error("Language model error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Graph database error: {0}")]
    GraphError(String),

    #[error("Vector database error: {0}")]
    VectorError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn store_unavailable(store: &'static str, reason: impl Into<String>) -> Self {
        Error::StoreUnavailable {
            store,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<neo4rs::Error> for Error {
    fn from(err: neo4rs::Error) -> Self {
        Error::GraphError(err.to_string())
    }
}

impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::VectorError(err.to_string())
    }
}

impl From<async_openai::error::OpenAIError> for Error {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        Error::EmbeddingError(err.to_string())
    }
}
