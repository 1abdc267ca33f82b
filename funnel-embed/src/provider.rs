//! Embedding providers: the remote service client and the offline fallback.
//!
//! ## Key Components
//!
//! - **EmbeddingProvider**: the capability trait the indexing and search
//!   pipeline is written against
//! - **RemoteProvider**: client for an OpenAI-compatible `/embeddings`
//!   endpoint that supports truncated (matryoshka) output dimensions
//! - **HashProvider**: deterministic offline implementation used in tests
//!   and when no credential is configured
//!
//! Which implementation backs the pipeline is decided once, at
//! construction time, by whoever assembles the application. Nothing in
//! this crate consults globals or the environment.

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A source of embedding vectors.
///
/// Implementations guarantee that a successful `embed_batch` returns
/// exactly one vector per input text, in input order, every vector of
/// length [`dimension`](EmbeddingProvider::dimension). Anything else is an
/// error, never a partial result.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text. Equivalent to a one-element batch.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(&texts).await?;
        vectors.pop().ok_or(EmbedError::CountMismatch {
            expected: 1,
            received: 0,
        })
    }

    /// The dimension every returned vector has.
    fn dimension(&self) -> usize;

    /// Short provider name for logs.
    fn provider_name(&self) -> &str;
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
///
/// Sends `{model, input, dimensions}` with a bearer token and re-orders the
/// response items by their `index` field, so the caller always sees vectors
/// in input order. The `dimensions` field asks the service for truncated
/// matryoshka output, which is what makes two-stage funnel search possible
/// without storing multiple vector sizes.
pub struct RemoteProvider {
    client: reqwest::Client,
    config: EmbedConfig,
    api_key: String,
}

impl RemoteProvider {
    /// Build a client from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::MissingCredential`] when `config.api_key` is
    /// unset, [`EmbedError::InvalidConfig`] when validation fails, and a
    /// transport error if the HTTP client cannot be constructed.
    pub fn new(config: EmbedConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| EmbedError::missing_credential("remote"))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.config.api_base.trim_end_matches('/'));
        let request = EmbeddingsRequest {
            model: &self.config.model,
            input: texts,
            dimensions: self.config.dimension,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            return Err(EmbedError::Service { status, body });
        }

        let mut parsed: EmbeddingsResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                received: parsed.data.len(),
            });
        }

        // Items carry the index of the input they belong to; restore input order.
        parsed.data.sort_by_key(|item| item.index);

        let mut vectors = Vec::with_capacity(parsed.data.len());
        for item in parsed.data {
            if item.embedding.len() != self.config.dimension {
                return Err(EmbedError::DimensionMismatch {
                    expected: self.config.dimension,
                    received: item.embedding.len(),
                });
            }
            vectors.push(item.embedding);
        }

        tracing::debug!(
            "Embedded {} texts with {} at {} dims",
            texts.len(),
            self.config.model,
            self.config.dimension
        );
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn provider_name(&self) -> &str {
        "remote"
    }
}

/// Deterministic offline provider deriving unit vectors from FNV-1a hashes.
///
/// Identical text always maps to the identical vector, which is all the
/// indexer's change-detection and idempotence guarantees require. The
/// vectors carry no semantic signal; search over them is exercising the
/// pipeline, not ranking quality.
pub struct HashProvider {
    dimension: usize,
}

impl HashProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector: Vec<f32> = (0..self.dimension)
            .map(|component| {
                let mut hasher = FnvHasher::default();
                text.hash(&mut hasher);
                component.hash(&mut hasher);
                // Map the 64-bit hash onto [-1, 1]
                (hasher.finish() as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32
            })
            .collect();

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hash"
    }
}
