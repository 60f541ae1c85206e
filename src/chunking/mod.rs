//! Fixed-size sliding-window chunking with overlap.
//!
//! Documents are split into windows of `window_size` characters that overlap
//! by `overlap` characters, so context near a window boundary is never lost
//! to the embedding model. Offsets are character-based: a window never splits
//! a multi-byte UTF-8 sequence.

use serde::{Deserialize, Serialize};

/// Default window size in characters.
pub const DEFAULT_WINDOW_SIZE: usize = 500;

/// Default overlap between consecutive windows, in characters.
pub const DEFAULT_OVERLAP: usize = 50;

/// Rejected window parameters. Fatal to the call; never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("window size must be positive")]
    WindowSize,

    #[error("overlap ({overlap}) must be smaller than the window size ({window})")]
    Overlap { overlap: usize, window: usize },
}

/// One contiguous slice of a source document.
///
/// `sequence_index` is zero-based, dense, and reflects document order, even
/// when whitespace-only windows were dropped between neighbours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_id: String,
    pub sequence_index: usize,
}

/// Splits `text` into overlapping windows of `window_size` characters.
///
/// Windows start at `0, (window − overlap), 2(window − overlap), …` and are
/// clipped to the end of the text; the last window ends exactly at the end of
/// the text, and no window is emitted whose start would lie past a point the
/// previous window already reached. Windows that are empty or all-whitespace
/// after trimming are dropped silently.
///
/// Empty input yields an empty vector, not an error. The split is
/// deterministic: identical inputs always produce identical output.
pub fn chunk_text(
    text: &str,
    window_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkError> {
    validate(window_size, overlap)?;
    Ok(windows(text, window_size, overlap))
}

fn validate(window_size: usize, overlap: usize) -> Result<(), ChunkError> {
    if window_size == 0 {
        return Err(ChunkError::WindowSize);
    }
    if overlap >= window_size {
        return Err(ChunkError::Overlap {
            overlap,
            window: window_size,
        });
    }
    Ok(())
}

fn windows(text: &str, window_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offsets of every character boundary, including the end of text.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = boundaries.len() - 1;
    let step = window_size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + window_size).min(total_chars);
        let window = &text[boundaries[start]..boundaries[end]];
        if !window.trim().is_empty() {
            chunks.push(window.to_string());
        }
        if start + window_size >= total_chars {
            break;
        }
        start += step;
    }
    chunks
}

/// Document chunker with a validated window configuration.
#[derive(Debug, Clone)]
pub struct Chunker {
    window_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl Chunker {
    /// Creates a chunker, rejecting invalid window parameters up front.
    pub fn new(window_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        validate(window_size, overlap)?;
        Ok(Self {
            window_size,
            overlap,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits `text` with the configured window. Infallible: the parameters
    /// were validated at construction.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        windows(text, self.window_size, self.overlap)
    }

    /// Splits `text` and tags each surviving window with its source and
    /// position. A document that chunks to nothing yields an empty vector;
    /// the caller treats that as a soft empty-document condition.
    pub fn process(&self, text: &str, source_id: &str) -> Vec<Chunk> {
        self.chunk(text)
            .into_iter()
            .enumerate()
            .map(|(sequence_index, text)| Chunk {
                text,
                source_id: source_id.to_string(),
                sequence_index,
            })
            .collect()
    }
}
