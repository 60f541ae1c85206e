//! HTTP client for a remote embedding API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{EmbeddingError, EmbeddingProvider, MAX_BATCH_SIZE};

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for an OpenAI-style embedding endpoint.
///
/// Requests are bearer-authenticated JSON of the form
/// `{"model": ..., "input": [...]}` and the response is expected to carry an
/// `embeddings` array with one vector per input, in order. Inputs larger
/// than the batch size are split into sequential requests transparently.
#[derive(Debug, Clone)]
pub struct RemoteEmbeddingClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl RemoteEmbeddingClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
            batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Overrides the per-request batch size. Mostly useful in tests.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn embed_one_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| EmbeddingError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                429 | 503 => EmbeddingError::RateLimited,
                400 | 403 => EmbeddingError::Blocked,
                code => EmbeddingError::Upstream { status: code },
            });
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingError::InvalidResponse(err.to_string()))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        for vector in &parsed.embeddings {
            if vector.len() != self.dimensions {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {}-dimensional vectors, got {}",
                    self.dimensions,
                    vector.len()
                )));
            }
        }
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_one_batch(batch).await?);
        }
        Ok(vectors)
    }
}
