//! Environment-driven service configuration.
//!
//! Every setting comes from a `RAGSERVE_*` variable, loaded through a
//! `.env` file when one is present. The embedding endpoint and API key have
//! no defaults; startup fails fast without them.

use std::env;

use crate::chunking::{DEFAULT_OVERLAP, DEFAULT_WINDOW_SIZE};
use crate::embeddings::RetryPolicy;
use crate::types::RagError;

/// Remote embedding provider settings.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub retry: RetryPolicy,
}

/// Defaults applied when a query request omits its knobs.
#[derive(Debug, Clone, Copy)]
pub struct QueryDefaults {
    pub top_k: usize,
    pub min_score: f32,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub database_path: String,
    pub embedding: EmbeddingSettings,
    pub window_size: usize,
    pub overlap: usize,
    pub query: QueryDefaults,
}

impl ServiceConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, RagError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            bind_addr: env_or("RAGSERVE_ADDR", "127.0.0.1:5001"),
            database_path: env_or("RAGSERVE_DB", "./ragserve.sqlite"),
            embedding: EmbeddingSettings {
                endpoint: required("RAGSERVE_EMBED_URL")?,
                api_key: required("RAGSERVE_EMBED_API_KEY")?,
                model: env_or("RAGSERVE_EMBED_MODEL", "text-embedding-004"),
                dimensions: parse_or("RAGSERVE_EMBED_DIM", 768)?,
                retry: RetryPolicy::default(),
            },
            window_size: parse_or("RAGSERVE_CHUNK_WINDOW", DEFAULT_WINDOW_SIZE)?,
            overlap: parse_or("RAGSERVE_CHUNK_OVERLAP", DEFAULT_OVERLAP)?,
            query: QueryDefaults {
                top_k: parse_or("RAGSERVE_QUERY_TOP_K", 5)?,
                min_score: parse_or("RAGSERVE_QUERY_MIN_SCORE", 0.0)?,
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required(key: &str) -> Result<String, RagError> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| RagError::Config(format!("{key} must be set")))
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, RagError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RagError::Config(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}
