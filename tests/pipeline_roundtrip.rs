//! Ingest-then-query flows against a real on-disk store with the
//! deterministic in-process embedder.

use std::sync::Arc;

use ragserve::chunking::Chunker;
use ragserve::embeddings::MockEmbeddingProvider;
use ragserve::pipeline::RagPipeline;
use ragserve::stores::SqliteVectorStore;
use ragserve::types::RagError;

async fn pipeline(dir: &tempfile::TempDir) -> RagPipeline {
    let embedder = MockEmbeddingProvider::new();
    let store = SqliteVectorStore::open(dir.path().join("pipeline.sqlite"), 16)
        .await
        .unwrap();
    RagPipeline::new(Arc::new(embedder), Arc::new(store), Chunker::default())
}

#[tokio::test]
async fn ingested_text_is_found_by_its_own_content() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir).await;

    // Shorter than one window, so the document is a single chunk and the
    // query text embeds identically to the stored chunk.
    let report = pipeline
        .ingest_text("cats.txt", "cats sleep most of the day")
        .await
        .unwrap();
    assert_eq!(report.chunks_stored, 1);
    pipeline
        .ingest_text("dogs.txt", "dogs enjoy long walks")
        .await
        .unwrap();

    let answer = pipeline
        .query("cats sleep most of the day", 5, 0.0)
        .await
        .unwrap();
    assert!(!answer.results.is_empty());
    assert_eq!(answer.results[0].text, "cats sleep most of the day");
    assert!(answer.results[0].score > 0.99);
    assert_eq!(answer.results[0].metadata["source"], "cats.txt");
}

#[tokio::test]
async fn results_spanning_documents_are_deduplicated_per_source() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir).await;

    pipeline
        .ingest_text("a.txt", "alpha topic, first take")
        .await
        .unwrap();
    pipeline
        .ingest_text("b.txt", "alpha topic, second take")
        .await
        .unwrap();

    let answer = pipeline.query("alpha topic", 10, 0.0).await.unwrap();
    let sources: Vec<&str> = answer
        .results
        .iter()
        .filter_map(|r| r.metadata["source"].as_str())
        .collect();
    let mut unique = sources.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(sources.len(), unique.len());
    assert_eq!(sources.len(), 2);
}

#[tokio::test]
async fn reingesting_a_document_does_not_duplicate_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir).await;

    pipeline
        .ingest_text("doc.txt", "stable content")
        .await
        .unwrap();
    let count_first = pipeline.stats().await.unwrap();

    pipeline
        .ingest_text("doc.txt", "stable content")
        .await
        .unwrap();
    assert_eq!(pipeline.stats().await.unwrap(), count_first);
}

#[tokio::test]
async fn empty_documents_and_queries_behave_softly_and_loudly() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir).await;

    let report = pipeline.ingest_text("blank.txt", "   \n\t ").await.unwrap();
    assert_eq!(report.chunks_stored, 0);
    assert_eq!(pipeline.stats().await.unwrap(), 0);

    let err = pipeline.query("   ", 5, 0.0).await.unwrap_err();
    assert!(matches!(err, RagError::EmptyQuery));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn remove_and_reset_clear_stored_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir).await;

    pipeline.ingest_text("a.txt", "first document").await.unwrap();
    pipeline.ingest_text("b.txt", "second document").await.unwrap();
    assert_eq!(pipeline.stats().await.unwrap(), 2);

    assert_eq!(pipeline.remove_document("a.txt").await.unwrap(), 1);
    assert_eq!(pipeline.remove_document("a.txt").await.unwrap(), 0);
    assert_eq!(pipeline.stats().await.unwrap(), 1);

    assert_eq!(pipeline.reset().await.unwrap(), 1);
    assert_eq!(pipeline.stats().await.unwrap(), 0);
}
