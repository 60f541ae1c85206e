//! End-to-end ingestion and query orchestration.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::chunking::Chunker;
use crate::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::extract::extract_text;
use crate::ranking::{Candidate, RankedResult, rank};
use crate::stores::{StoredChunk, VectorBackend};
use crate::types::RagError;

/// Outcome of ingesting one document. `chunks_stored == 0` means the
/// document held no extractable text; that is reported, not failed.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub chunks_stored: usize,
}

/// Outcome of one query, with the raw candidate counts surrounding the
/// ranking pass for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub results: Vec<RankedResult>,
    pub candidates_before_filter: usize,
    pub returned_after_filter: usize,
}

/// Wires the chunker, an embedding provider, and a vector store into the
/// ingest and query flows.
pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorBackend>,
    chunker: Chunker,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorBackend>,
        chunker: Chunker,
    ) -> Self {
        Self {
            embedder,
            store,
            chunker,
        }
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    pub fn embedding_dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    /// Extracts text from an uploaded file and ingests it under the file
    /// name as source id.
    pub async fn ingest_file(&self, file_name: &str, bytes: &[u8]) -> Result<IngestReport, RagError> {
        let text = extract_text(file_name, bytes).await?;
        self.ingest_text(file_name, &text).await
    }

    /// Chunks `text`, embeds every chunk, and upserts the results under
    /// deterministic ids, so re-ingesting a document replaces its previous
    /// chunks instead of accumulating duplicates.
    pub async fn ingest_text(&self, source_id: &str, text: &str) -> Result<IngestReport, RagError> {
        let chunks = self.chunker.process(text, source_id);
        if chunks.is_empty() {
            info!(source = source_id, "document produced no chunks");
            return Ok(IngestReport {
                source: source_id.to_string(),
                chunks_stored: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            ))
            .into());
        }

        let stored: Vec<StoredChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredChunk {
                id: chunk_id(&chunk.source_id, chunk.sequence_index),
                metadata: json!({
                    "source": chunk.source_id,
                    "chunk_index": chunk.sequence_index,
                }),
                source: chunk.source_id,
                chunk_index: chunk.sequence_index,
                content: chunk.text,
                embedding,
            })
            .collect();

        let chunks_stored = stored.len();
        self.store.upsert_chunks(stored).await?;
        info!(source = source_id, chunks = chunks_stored, "document ingested");

        Ok(IngestReport {
            source: source_id.to_string(),
            chunks_stored,
        })
    }

    /// Embeds `question`, fetches nearest chunks, and post-processes them
    /// into at most `top_k` results at or above `min_score`.
    pub async fn query(
        &self,
        question: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<QueryReport, RagError> {
        if question.trim().is_empty() {
            return Err(RagError::EmptyQuery);
        }

        let texts = vec![question.to_string()];
        let mut embeddings = self.embedder.embed_batch(&texts).await?;
        let embedding = embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".into()))?;

        let candidates: Vec<Candidate> = self.store.search_similar(&embedding, top_k).await?;
        let candidates_before_filter = candidates.len();
        let results = rank(&candidates, top_k, min_score);
        let returned_after_filter = results.len();
        info!(
            top_k,
            min_score,
            candidates = candidates_before_filter,
            returned = returned_after_filter,
            "query answered"
        );

        Ok(QueryReport {
            results,
            candidates_before_filter,
            returned_after_filter,
        })
    }

    /// Removes every chunk of `source_id`; returns how many were deleted.
    pub async fn remove_document(&self, source_id: &str) -> Result<usize, RagError> {
        Ok(self.store.delete_by_source(source_id).await?)
    }

    /// Number of chunks currently stored.
    pub async fn stats(&self) -> Result<usize, RagError> {
        Ok(self.store.count().await?)
    }

    /// Drops all stored chunks; returns how many were deleted.
    pub async fn reset(&self) -> Result<usize, RagError> {
        Ok(self.store.reset().await?)
    }
}

/// Deterministic chunk id derived from source and position.
fn chunk_id(source_id: &str, sequence_index: usize) -> String {
    let name = format!("{source_id}:{sequence_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}
