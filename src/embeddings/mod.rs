//! Embedding providers.
//!
//! [`EmbeddingProvider`] is the seam between the pipeline and whatever turns
//! text into vectors. [`remote::RemoteEmbeddingClient`] talks to an HTTP
//! embedding API; [`MockEmbeddingProvider`] produces deterministic vectors
//! for tests and offline runs; [`retry::RetryingEmbedder`] wraps any provider
//! with backoff on transient failures.

pub mod remote;
pub mod retry;

use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;

pub use remote::RemoteEmbeddingClient;
pub use retry::{RetryPolicy, RetryingEmbedder};

/// Largest number of texts sent to a provider in one call.
pub const MAX_BATCH_SIZE: usize = 100;

/// Embedding failures, classified by what the caller can do about them.
///
/// [`EmbeddingError::is_transient`] is the single place that decides which
/// kinds are worth retrying.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    /// The provider asked us to slow down (HTTP 429 or 503).
    #[error("embedding provider rate-limited the request")]
    RateLimited,

    /// The provider rejected the request outright (HTTP 400 or 403).
    /// Retrying an identical request cannot succeed.
    #[error("embedding provider rejected the request")]
    Blocked,

    /// Any other non-success status from the provider.
    #[error("embedding provider returned status {status}")]
    Upstream { status: u16 },

    /// The request never completed: connect failure, timeout, broken stream.
    #[error("embedding transport error: {0}")]
    Transport(String),

    /// The provider answered 200 but the body did not match the contract.
    #[error("embedding response invalid: {0}")]
    InvalidResponse(String),
}

impl EmbeddingError {
    /// Whether a retry with backoff has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EmbeddingError::RateLimited | EmbeddingError::Transport(_)
        )
    }
}

/// Turns batches of text into fixed-dimension embedding vectors.
///
/// Implementations must return exactly one vector per input text, in input
/// order, each of [`dimensions`](EmbeddingProvider::dimensions) length.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Human-readable provider or model name, for health reporting.
    fn name(&self) -> &str;

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Deterministic in-process provider for tests and offline use.
///
/// Each text is hashed and the hash seeds a small generator, so equal texts
/// always map to equal vectors and different texts almost always differ.
/// Vectors are L2-normalized, which makes cosine similarity of a text with
/// itself come out at 1.0.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self { dimensions: 16 }
    }
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish();

        let mut vector = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            // Top bits of the state, mapped into [-1, 1].
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            vector.push(unit * 2.0 - 1.0);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}
