//! HTTP surface.
//!
//! Routes:
//! - `GET  /healthz` liveness plus store and embedder info
//! - `POST /api/upload` multipart document upload and ingestion
//! - `POST /api/query` similarity query with optional `top_k` / `min_score`
//! - `GET  /api/stats` stored chunk count
//! - `DELETE /api/documents/{source}` remove one document's chunks
//! - `DELETE /api/reset` drop everything

use std::sync::Arc;

use axum::Router;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::error;
use uuid::Uuid;

use crate::config::QueryDefaults;
use crate::pipeline::RagPipeline;
use crate::types::RagError;

pub struct AppState {
    pub pipeline: RagPipeline,
    pub query_defaults: QueryDefaults,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/upload", post(upload))
        .route("/api/query", post(query))
        .route("/api/stats", get(stats))
        .route("/api/documents/{source}", delete(remove_document))
        .route("/api/reset", delete(reset))
        .with_state(state)
}

/// Errors rendered as JSON `{"error": ...}` with an appropriate status.
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(RagError),
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(err) => {
                error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store_ok = state.pipeline.stats().await.is_ok();
    Json(json!({
        "status": if store_ok { "ok" } else { "degraded" },
        "checks": { "store": store_ok },
        "embedder": {
            "provider": state.pipeline.embedder_name(),
            "dimensions": state.pipeline.embedding_dimensions(),
        },
    }))
}

async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        if field.name() == Some("file") {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| ApiError::BadRequest("uploaded file has no name".into()))?;
            let bytes = field
                .bytes()
                .await
                .map_err(|err| ApiError::BadRequest(err.to_string()))?;
            file = Some((file_name, bytes.to_vec()));
        }
    }
    let (file_name, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("multipart field 'file' is required".into()))?;

    let report = state.pipeline.ingest_file(&file_name, &bytes).await?;
    if report.chunks_stored == 0 {
        return Err(ApiError::BadRequest("no text extracted from file".into()));
    }

    Ok(Json(json!({
        "upload_id": Uuid::new_v4().to_string(),
        "filename": report.source,
        "chunk_count": report.chunks_stored,
    })))
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    question: String,
    top_k: Option<usize>,
    min_score: Option<f32>,
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Value>, ApiError> {
    let top_k = request.top_k.unwrap_or(state.query_defaults.top_k);
    let min_score = request.min_score.unwrap_or(state.query_defaults.min_score);

    let report = state.pipeline.query(&request.question, top_k, min_score).await?;
    Ok(Json(json!({
        "question": request.question,
        "results": report.results,
        "count": report.returned_after_filter,
        "debug": {
            "requested_top_k": top_k,
            "requested_min_score": min_score,
            "returned_before_filter": report.candidates_before_filter,
            "returned_after_filter": report.returned_after_filter,
        },
    })))
}

async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let count = state.pipeline.stats().await?;
    Ok(Json(json!({ "chunk_count": count })))
}

async fn remove_document(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.pipeline.remove_document(&source).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound(format!("no chunks stored for {source}")));
    }
    Ok(Json(json!({ "source": source, "deleted": deleted })))
}

async fn reset(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let deleted = state.pipeline.reset().await?;
    Ok(Json(json!({
        "message": "vector store cleared",
        "count": deleted,
    })))
}
