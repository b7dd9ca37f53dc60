//! In-process semantic store: brute-force cosine search over embedded chunks

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::embeddings::{cosine_similarity, Embedder};
use super::models::ChunkHit;
use super::SemanticStore;
use crate::ingest::chunker::Chunk;
use crate::Result;

/// Stored chunk with its embedding.
#[derive(Debug, Clone)]
struct IndexedChunk {
    chunk: Chunk,
    embedding: Vec<f32>,
}

pub struct MemoryIndex {
    embedder: Embedder,
    index: RwLock<Vec<IndexedChunk>>,
}

impl MemoryIndex {
    pub fn new(embedder: Embedder) -> Self {
        Self {
            embedder,
            index: RwLock::new(Vec::new()),
        }
    }

    /// Index using the local hashing embedder.
    pub fn with_local(dim: usize) -> Self {
        Self::new(Embedder::local(dim))
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }
}

#[async_trait]
impl SemanticStore for MemoryIndex {
    async fn search(&self, query: &str, top_k: usize, min_score: f32) -> Result<Vec<ChunkHit>> {
        if self.is_empty().await {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_one(query).await?;
        let index = self.index.read().await;

        let mut hits: Vec<ChunkHit> = index
            .iter()
            .map(|entry| ChunkHit {
                content: entry.chunk.text.clone(),
                score: cosine_similarity(&query_embedding, &entry.embedding).clamp(0.0, 1.0),
                chunk_id: entry.chunk.id,
                document: entry.chunk.document.clone(),
            })
            .filter(|hit| hit.score >= min_score)
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        debug!("Memory index returned {} hits", hits.len());

        Ok(hits)
    }

    async fn index_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        let chunks: Vec<&Chunk> = chunks.iter().filter(|c| !c.text.trim().is_empty()).collect();
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        let mut index = self.index.write().await;
        let before = index.len();
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            index.push(IndexedChunk {
                chunk: chunk.clone(),
                embedding,
            });
        }

        Ok(index.len() - before)
    }

    async fn clear(&self) -> Result<()> {
        self.index.write().await.clear();
        Ok(())
    }
}
