//! Entity (graph) and semantic (vector) stores
//!
//! Both stores are consumed through traits so the router can be built over
//! Neo4j and Qdrant in production and over in-memory stores in tests.

pub mod embeddings;
pub mod graph_db;
pub mod memory_graph;
pub mod memory_index;
pub mod models;
pub mod vector_db;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, StoreBackend};
use crate::ingest::chunker::Chunk;
use crate::ingest::schema::ValidatedExtraction;
use crate::Result;

pub use embeddings::Embedder;
pub use graph_db::GraphStore;
pub use memory_graph::MemoryGraph;
pub use memory_index::MemoryIndex;
pub use models::{ChunkHit, EntityPattern, EntityRecord, EntityType, RelationshipType, UpsertStats};
pub use vector_db::VectorStore;

/// Labeled-property graph holding typed entities.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Records matching the pattern, best match first, at most `limit`.
    async fn query_entities(&self, pattern: &EntityPattern, limit: usize)
        -> Result<Vec<EntityRecord>>;

    async fn upsert_entities(&self, extraction: &ValidatedExtraction) -> Result<UpsertStats>;

    /// Create uniqueness constraints.
    async fn init_schema(&self) -> Result<()>;

    /// Delete every node and relationship.
    async fn clear(&self) -> Result<()>;
}

/// Similarity index over document chunks.
#[async_trait]
pub trait SemanticStore: Send + Sync {
    /// Up to `top_k` chunks scoring at least `min_score`, best first.
    async fn search(&self, query: &str, top_k: usize, min_score: f32) -> Result<Vec<ChunkHit>>;

    /// Embed and persist chunks. Returns the number stored.
    async fn index_chunks(&self, chunks: &[Chunk]) -> Result<usize>;

    async fn clear(&self) -> Result<()>;
}

/// Open the entity store selected in the configuration.
pub async fn open_entity_store(config: &Config) -> Result<Arc<dyn EntityStore>> {
    match config.graph.backend {
        StoreBackend::Remote => {
            let store = GraphStore::connect(&config.graph).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => Ok(Arc::new(MemoryGraph::new())),
    }
}

/// Open the semantic store selected in the configuration.
pub async fn open_semantic_store(config: &Config) -> Result<Arc<dyn SemanticStore>> {
    let embedder = Embedder::from_env(&config.vector.embedding_model, config.vector.embedding_dim);
    match config.vector.backend {
        StoreBackend::Remote => {
            let store = VectorStore::connect(&config.vector, embedder).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => Ok(Arc::new(MemoryIndex::new(embedder))),
    }
}
