use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use ragserve::api::{self, AppState};
use ragserve::chunking::Chunker;
use ragserve::config::ServiceConfig;
use ragserve::embeddings::{RemoteEmbeddingClient, RetryingEmbedder};
use ragserve::pipeline::RagPipeline;
use ragserve::stores::SqliteVectorStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServiceConfig::from_env()?;

    let http = reqwest::Client::builder()
        .user_agent(concat!("ragserve/", env!("CARGO_PKG_VERSION")))
        .use_rustls_tls()
        .build()?;
    let embedder = RetryingEmbedder::new(RemoteEmbeddingClient::new(
        http,
        config.embedding.endpoint.clone(),
        config.embedding.api_key.clone(),
        config.embedding.model.clone(),
        config.embedding.dimensions,
    ))
    .with_policy(config.embedding.retry);

    let store = SqliteVectorStore::open(&config.database_path, config.embedding.dimensions).await?;
    let chunker = Chunker::new(config.window_size, config.overlap)?;
    let pipeline = RagPipeline::new(Arc::new(embedder), Arc::new(store), chunker);

    let state = Arc::new(AppState {
        pipeline,
        query_defaults: config.query,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        db = %config.database_path,
        model = %config.embedding.model,
        "ragserve listening"
    );
    axum::serve(listener, api::router(state).into_make_service()).await?;
    Ok(())
}
