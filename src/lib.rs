//! ```text
//! upload ──► extract ──► chunking::Chunker ──► embeddings (batched, retried)
//!                                                        │
//!                                                        ▼
//!                                          stores::VectorBackend (sqlite-vec)
//!                                                        │
//! query ──► embeddings ──► stores::search_similar ──► ranking::rank ──► results
//! ```
//!
//! The chunker and ranker are pure, synchronous transformations; everything
//! that touches the network or disk lives behind the collaborator traits in
//! [`embeddings`] and [`stores`]. [`pipeline::RagPipeline`] wires the pieces
//! together and [`api`] exposes them over HTTP.

pub mod api;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod pipeline;
pub mod ranking;
pub mod stores;
pub mod types;

pub use chunking::{Chunk, Chunker, chunk_text};
pub use pipeline::RagPipeline;
pub use ranking::{Candidate, RankedResult, rank};
pub use types::RagError;
