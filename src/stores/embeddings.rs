//! Text embeddings: OpenAI when a key is present, deterministic hashing otherwise

use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client as OpenAIClient,
};
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::{Error, Result};

/// Longest input (in characters) sent to the embeddings endpoint.
const MAX_INPUT_CHARS: usize = 8000;

/// Service for generating text embeddings through the OpenAI API
pub struct EmbeddingService {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
}

impl EmbeddingService {
    /// Create a service from `OPENAI_API_KEY`.
    pub fn new(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::EmbeddingError("OPENAI_API_KEY not set".to_string()))?;

        let config = OpenAIConfig::new().with_api_key(api_key);
        Ok(Self {
            client: OpenAIClient::with_config(config),
            model: model.into(),
        })
    }

    /// Generate embeddings for multiple texts in batch.
    ///
    /// Blank inputs get an empty vector at their position.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let processed: Vec<String> = texts
            .iter()
            .map(|t| t.trim().chars().take(MAX_INPUT_CHARS).collect::<String>())
            .filter(|t| !t.is_empty())
            .collect();

        if processed.is_empty() {
            return Ok(vec![Vec::new(); texts.len()]);
        }

        debug!("Generating embeddings for {} texts", processed.len());

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(processed))
            .build()?;

        let response = self.client.embeddings().create(request).await?;

        info!(
            "Generated {} embeddings, tokens used: {}",
            response.data.len(),
            response.usage.total_tokens
        );

        let mut result = Vec::with_capacity(texts.len());
        let mut embed_iter = response.data.into_iter();
        for text in texts {
            if text.trim().is_empty() {
                result.push(Vec::new());
            } else if let Some(embed) = embed_iter.next() {
                result.push(embed.embedding);
            }
        }

        Ok(result)
    }

    /// Embedding dimension for the configured model
    pub fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }
}

/// Deterministic hashed bag-of-words embedding for offline use.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dim: usize,
}

impl LocalEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    /// Bucket of one lowercased token. Fixed across builds, since stored
    /// vectors must keep matching new queries.
    fn bucket(&self, token: &str) -> usize {
        (xxh3_64(token.as_bytes()) % self.dim as u64) as usize
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dim];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            vec[self.bucket(&token.to_lowercase())] += 1.0;
        }

        normalize(&mut vec);
        vec
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }
}

/// Embedding backend shared by both semantic store implementations.
#[allow(clippy::large_enum_variant)]
pub enum Embedder {
    OpenAi(EmbeddingService),
    Local(LocalEmbedder),
}

impl Embedder {
    /// OpenAI if `OPENAI_API_KEY` is set, local hashing otherwise.
    pub fn from_env(model: &str, local_dim: usize) -> Self {
        match EmbeddingService::new(model) {
            Ok(service) => {
                info!(model, "Using OpenAI embeddings");
                Embedder::OpenAi(service)
            }
            Err(err) => {
                warn!("Falling back to local embeddings ({err})");
                Embedder::Local(LocalEmbedder::new(local_dim))
            }
        }
    }

    pub fn local(dim: usize) -> Self {
        Embedder::Local(LocalEmbedder::new(dim))
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            Embedder::OpenAi(service) => service.embed_batch(texts).await,
            Embedder::Local(local) => Ok(texts.iter().map(|t| local.embed(t)).collect()),
        }
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingError("No embedding returned".to_string()))
    }

    pub fn dimension(&self) -> usize {
        match self {
            Embedder::OpenAi(service) => service.dimension(),
            Embedder::Local(local) => local.dimension(),
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_handles_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);

        let aligned = cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]);
        assert!((aligned - 1.0).abs() < 1e-6);

        let orthogonal = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(orthogonal.abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_vector_stays_zero() {
        let mut vec = vec![0.0, 0.0, 0.0];
        normalize(&mut vec);
        assert!(vec.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn local_embedder_is_deterministic_and_unit_length() {
        let embedder = LocalEmbedder::new(64);
        let a = embedder.embed("Revenue grew in 2023");
        let b = embedder.embed("Revenue grew in 2023");

        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn local_embedder_buckets_by_xxh3_of_lowercased_token() {
        let embedder = LocalEmbedder::new(64);
        let v = embedder.embed("REVENUE");

        let expected = (xxh3_64(b"revenue") % 64) as usize;
        assert_eq!(v[expected], 1.0);
        assert_eq!(v.iter().filter(|x| **x != 0.0).count(), 1);
    }

    #[test]
    fn local_embedder_ignores_punctuation_and_case() {
        let embedder = LocalEmbedder::new(64);
        assert_eq!(embedder.embed("Python, Rust!"), embedder.embed("python rust"));
    }

    #[test]
    fn local_embedder_respects_minimum_dimension() {
        assert_eq!(LocalEmbedder::new(0).dimension(), 8);
    }

    #[tokio::test]
    async fn local_backend_embeds_each_text() {
        let embedder = Embedder::local(32);
        let vectors = embedder
            .embed(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(embedder.dimension(), 32);
        assert_eq!(embedder.embed_one("alpha").await.unwrap(), vectors[0]);
    }

    #[tokio::test]
    async fn openai_batch_short_circuits_on_blank_texts() {
        let service = EmbeddingService {
            client: OpenAIClient::with_config(OpenAIConfig::new().with_api_key("test_key")),
            model: "text-embedding-3-small".to_string(),
        };

        let embeddings = service
            .embed_batch(&["   ".to_string(), "\n".to_string()])
            .await
            .unwrap();

        assert_eq!(embeddings.len(), 2);
        assert!(embeddings.iter().all(|e| e.is_empty()));
        assert_eq!(service.dimension(), 1536);
    }
}
