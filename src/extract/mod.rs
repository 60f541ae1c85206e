//! Plain-text extraction from uploaded documents.
//!
//! Supported formats: plain text (`.txt`), Markdown (`.md`, `.markdown`),
//! and PDF (`.pdf`). Anything else is rejected up front with the extension
//! named, so the caller can report it without guessing.

use tokio::task;

/// Extraction failures. `UnsupportedSource` is a caller error; `Unreadable`
/// means the bytes did not parse as the format the extension claimed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: .{extension}")]
    UnsupportedSource { extension: String },

    #[error("could not read document: {0}")]
    Unreadable(String),
}

/// Extracts plain text from `bytes`, dispatching on the extension of
/// `file_name`.
///
/// Text and Markdown bytes are decoded as UTF-8 with lossy replacement, so a
/// stray invalid byte never fails an upload. PDF parsing is CPU-bound and
/// runs on the blocking pool.
///
/// # Examples
///
/// ```rust,ignore
/// let text = extract_text("notes.md", b"# Heading\nbody").await?;
/// assert!(text.contains("Heading"));
/// ```
pub async fn extract_text(file_name: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "md" | "markdown" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        "pdf" => extract_pdf(bytes.to_vec()).await,
        _ => Err(ExtractError::UnsupportedSource { extension }),
    }
}

async fn extract_pdf(bytes: Vec<u8>) -> Result<String, ExtractError> {
    let parsed = task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|join| ExtractError::Unreadable(join.to_string()))?;
    parsed.map_err(|err| ExtractError::Unreadable(err.to_string()))
}
