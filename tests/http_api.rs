//! HTTP round trips against the full router, served on an ephemeral port.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::net::TcpListener;

use ragserve::api::{AppState, router};
use ragserve::chunking::Chunker;
use ragserve::config::QueryDefaults;
use ragserve::embeddings::MockEmbeddingProvider;
use ragserve::pipeline::RagPipeline;
use ragserve::stores::SqliteVectorStore;

async fn spawn_server(dir: &tempfile::TempDir) -> String {
    let store = SqliteVectorStore::open(dir.path().join("api.sqlite"), 16)
        .await
        .unwrap();
    let pipeline = RagPipeline::new(
        Arc::new(MockEmbeddingProvider::new()),
        Arc::new(store),
        Chunker::default(),
    );
    let state = Arc::new(AppState {
        pipeline,
        query_defaults: QueryDefaults {
            top_k: 5,
            min_score: 0.0,
        },
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state).into_make_service())
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

async fn upload_text(client: &reqwest::Client, base: &str, name: &str, body: &str) -> reqwest::Response {
    let part = reqwest::multipart::Part::bytes(body.as_bytes().to_vec()).file_name(name.to_string());
    let form = reqwest::multipart::Form::new().part("file", part);
    client
        .post(format!("{base}/api/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn healthz_reports_store_and_embedder() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["store"], true);
    assert_eq!(body["embedder"]["provider"], "mock");
    assert_eq!(body["embedder"]["dimensions"], 16);
}

#[tokio::test]
async fn upload_then_query_returns_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let response = upload_text(&client, &base, "notes.txt", "tokio powers the async runtime").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["filename"], "notes.txt");
    assert_eq!(body["chunk_count"], 1);
    assert!(body["upload_id"].as_str().is_some());

    let response = client
        .post(format!("{base}/api/query"))
        .json(&json!({ "question": "tokio powers the async runtime" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["metadata"]["source"], "notes.txt");
    assert_eq!(body["debug"]["requested_top_k"], 5);
}

#[tokio::test]
async fn stats_reset_and_document_deletion() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    upload_text(&client, &base, "a.txt", "first").await;
    upload_text(&client, &base, "b.txt", "second").await;

    let body: Value = client
        .get(format!("{base}/api/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["chunk_count"], 2);

    let response = client
        .delete(format!("{base}/api/documents/a.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["deleted"], 1);

    let response = client
        .delete(format!("{base}/api/documents/missing.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .delete(format!("{base}/api/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 1);

    let body: Value = client
        .get(format!("{base}/api/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["chunk_count"], 0);
}

#[tokio::test]
async fn bad_uploads_and_queries_are_client_errors() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let response = upload_text(&client, &base, "report.docx", "binary-ish").await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("docx"));

    let response = upload_text(&client, &base, "empty.txt", "   ").await;
    assert_eq!(response.status(), 400);

    let response = client
        .post(format!("{base}/api/query"))
        .json(&json!({ "question": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}
