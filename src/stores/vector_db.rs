//! Semantic store backed by Qdrant

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, CreateCollectionBuilder, Distance, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info};
use uuid::Uuid;

use super::embeddings::Embedder;
use super::models::ChunkHit;
use super::SemanticStore;
use crate::config::VectorConfig;
use crate::ingest::chunker::Chunk;
use crate::Result;

/// Points per upsert request.
const UPSERT_BATCH: usize = 64;

/// Vector store backed by Qdrant
pub struct VectorStore {
    client: Qdrant,
    collection: String,
    embedder: Embedder,
}

impl VectorStore {
    /// Connect to Qdrant and make sure the collection exists.
    pub async fn connect(config: &VectorConfig, embedder: Embedder) -> Result<Self> {
        let client = Qdrant::from_url(&config.url).build()?;
        let store = Self {
            client,
            collection: config.collection.clone(),
            embedder,
        };
        store.init_collection().await?;
        info!(url = %config.url, collection = %store.collection, "Connected to Qdrant");
        Ok(store)
    }

    /// Initialize the collection if it doesn't exist
    async fn init_collection(&self) -> Result<()> {
        let collections = self.client.list_collections().await?;
        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if exists {
            debug!("Collection '{}' already exists", self.collection);
            return Ok(());
        }

        info!("Creating collection '{}'", self.collection);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.embedder.dimension() as u64, Distance::Cosine),
                ),
            )
            .await?;
        Ok(())
    }
}

fn chunk_payload(chunk: &Chunk) -> HashMap<String, QdrantValue> {
    let mut payload: HashMap<String, QdrantValue> = HashMap::new();
    payload.insert("text".into(), chunk.text.clone().into());
    payload.insert("document".into(), chunk.document.clone().into());
    payload.insert("source".into(), chunk.source.clone().into());
    payload.insert("chunk_index".into(), (chunk.index as i64).into());
    payload
}

#[async_trait]
impl SemanticStore for VectorStore {
    async fn search(&self, query: &str, top_k: usize, min_score: f32) -> Result<Vec<ChunkHit>> {
        let embedding = self.embedder.embed_one(query).await?;
        if embedding.is_empty() {
            return Ok(Vec::new());
        }

        let request = SearchPointsBuilder::new(&self.collection, embedding, top_k as u64)
            .with_payload(true)
            .score_threshold(min_score);
        let response = self.client.search_points(request).await?;

        let hits: Vec<ChunkHit> = response
            .result
            .into_iter()
            .filter_map(|point| {
                let chunk_id = match point.id?.point_id_options? {
                    PointIdOptions::Uuid(raw) => Uuid::parse_str(&raw).ok()?,
                    PointIdOptions::Num(_) => return None,
                };
                Some(ChunkHit {
                    content: point.payload.get("text")?.as_text()?.to_string(),
                    score: point.score.clamp(0.0, 1.0),
                    chunk_id,
                    document: point
                        .payload
                        .get("document")
                        .and_then(|v| v.as_text())
                        .unwrap_or_default()
                        .to_string(),
                })
            })
            .filter(|hit| hit.score >= min_score)
            .collect();

        debug!("Qdrant returned {} hits", hits.len());
        Ok(hits)
    }

    async fn index_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        let mut stored = 0;

        for batch in chunks.chunks(UPSERT_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;

            let points: Vec<PointStruct> = batch
                .iter()
                .zip(embeddings)
                .filter(|(_, embedding)| !embedding.is_empty())
                .map(|(chunk, embedding)| {
                    PointStruct::new(chunk.id.to_string(), embedding, chunk_payload(chunk))
                })
                .collect();

            if points.is_empty() {
                continue;
            }
            let count = points.len();
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
                .await?;
            stored += count;
            debug!("Upserted {} points to Qdrant", count);
        }

        info!("Indexed {} chunks into '{}'", stored, self.collection);
        Ok(stored)
    }

    /// Drop and recreate the collection.
    async fn clear(&self) -> Result<()> {
        self.client.delete_collection(&self.collection).await?;
        info!("Cleared collection '{}'", self.collection);
        self.init_collection().await
    }
}

trait QdrantValueExt {
    fn as_text(&self) -> Option<&str>;
}

impl QdrantValueExt for QdrantValue {
    fn as_text(&self) -> Option<&str> {
        match &self.kind {
            Some(Kind::StringValue(v)) => Some(v),
            _ => None,
        }
    }
}
