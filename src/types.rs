//! Shared error types.

use crate::chunking::ChunkError;
use crate::embeddings::EmbeddingError;
use crate::extract::ExtractError;
use crate::stores::StoreError;

/// Umbrella error for pipeline and service operations.
///
/// Each collaborator boundary keeps its own closed set of error kinds; this
/// enum composes them so callers can branch on the failing subsystem instead
/// of inspecting message text.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("chunking failed: {0}")]
    Chunking(#[from] ChunkError),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("storage failed: {0}")]
    Storage(#[from] StoreError),

    #[error("query text must not be empty")]
    EmptyQuery,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Whether the failure was caused by the caller's input rather than a
    /// downstream dependency.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RagError::Chunking(_) | RagError::Extraction(_) | RagError::EmptyQuery
        )
    }
}
