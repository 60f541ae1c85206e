//! Vector storage backends.
//!
//! [`VectorBackend`] is the persistence seam: the pipeline hands it chunks
//! with embeddings and asks it for nearest neighbours, and never sees SQL.
//! The shipped implementation is [`sqlite::SqliteVectorStore`].

pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;

use crate::ranking::Candidate;

pub use sqlite::SqliteVectorStore;

/// Storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing database could not be opened or initialized.
    #[error("vector store unavailable: {0}")]
    Unavailable(String),

    /// A query or write against an open store failed.
    #[error("vector store operation failed: {0}")]
    Backend(String),

    /// A vector did not match the dimension the store was created with.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// A chunk ready for persistence: stable id, provenance, text, and vector.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    /// Deterministic id derived from source and position, so re-ingesting
    /// the same document overwrites rather than duplicates.
    pub id: String,
    pub source: String,
    pub chunk_index: usize,
    pub content: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

/// Persistence and similarity search over embedded chunks.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Inserts or replaces chunks keyed by their id.
    async fn upsert_chunks(&self, chunks: Vec<StoredChunk>) -> Result<(), StoreError>;

    /// Returns up to `top_k` nearest chunks by cosine similarity, best
    /// first. Scores are similarities in `[-1, 1]`, higher is closer.
    async fn search_similar(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Candidate>, StoreError>;

    /// Removes every chunk belonging to `source`; returns how many went.
    async fn delete_by_source(&self, source: &str) -> Result<usize, StoreError>;

    /// Number of stored chunks.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Drops all stored chunks and vectors; returns how many chunks went.
    async fn reset(&self) -> Result<usize, StoreError>;
}
