//! SQLite-backed vector store using the sqlite-vec extension.
//!
//! Chunks live in a plain `chunks` table keyed by their deterministic id;
//! their embeddings live in a `chunk_vectors` vec0 virtual table keyed by
//! the chunk row's rowid. Similarity search joins the two on rowid and
//! orders by cosine distance.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use serde_json::Value;
use tokio_rusqlite::{Connection, OptionalExtension, ffi, params};

use super::{StoreError, StoredChunk, VectorBackend};
use crate::ranking::Candidate;

#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Connection,
    dimensions: usize,
}

impl SqliteVectorStore {
    /// Opens (creating if needed) the database at `path` and ensures the
    /// schema exists for `dimensions`-length vectors.
    pub async fn open(path: impl AsRef<Path>, dimensions: usize) -> Result<Self, StoreError> {
        register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        conn.call(move |conn| {
            // Fails fast if the extension did not load.
            conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))?;

            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS chunks (
                     id TEXT PRIMARY KEY,
                     source TEXT NOT NULL,
                     chunk_index INTEGER NOT NULL,
                     metadata TEXT NOT NULL,
                     content TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source);",
            )?;
            conn.execute_batch(&format!(
                "CREATE VIRTUAL TABLE IF NOT EXISTS chunk_vectors USING vec0(embedding float[{dimensions}]);"
            ))?;
            Ok::<_, tokio_rusqlite::Error>(())
        })
        .await
        .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        Ok(Self { conn, dimensions })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[async_trait]
impl VectorBackend for SqliteVectorStore {
    async fn upsert_chunks(&self, chunks: Vec<StoredChunk>) -> Result<(), StoreError> {
        if chunks.is_empty() {
            return Ok(());
        }
        for chunk in &chunks {
            if chunk.embedding.len() != self.dimensions {
                return Err(StoreError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: chunk.embedding.len(),
                });
            }
        }

        // Vector JSON and metadata are serialized outside the closure so
        // only rusqlite errors can occur inside it.
        let rows: Vec<(String, String, i64, String, String, String)> = chunks
            .into_iter()
            .map(|chunk| {
                let vector_json = serde_json::to_string(&chunk.embedding).unwrap_or_default();
                (
                    chunk.id,
                    chunk.source,
                    chunk.chunk_index as i64,
                    chunk.metadata.to_string(),
                    chunk.content,
                    vector_json,
                )
            })
            .collect();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for (id, source, chunk_index, metadata, content, vector_json) in rows {
                    let existing: Option<i64> = tx
                        .query_row("SELECT rowid FROM chunks WHERE id = ?", [&id], |row| {
                            row.get(0)
                        })
                        .optional()?;
                    if let Some(rowid) = existing {
                        tx.execute("DELETE FROM chunk_vectors WHERE rowid = ?", [rowid])?;
                        tx.execute("DELETE FROM chunks WHERE rowid = ?", [rowid])?;
                    }
                    tx.execute(
                        "INSERT INTO chunks (id, source, chunk_index, metadata, content) \
                         VALUES (?, ?, ?, ?, ?)",
                        params![id, source, chunk_index, metadata, content],
                    )?;
                    let rowid = tx.last_insert_rowid();
                    tx.execute(
                        "INSERT INTO chunk_vectors (rowid, embedding) VALUES (?, vec_f32(?))",
                        params![rowid, vector_json],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(StoreError::from)
    }

    async fn search_similar(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Candidate>, StoreError> {
        if embedding.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let embedding_json =
            serde_json::to_string(embedding).map_err(|err| StoreError::Backend(err.to_string()))?;

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT c.content, c.metadata, \
                     vec_distance_cosine(v.embedding, vec_f32(?)) AS distance \
                     FROM chunks c \
                     JOIN chunk_vectors v ON v.rowid = c.rowid \
                     ORDER BY distance ASC \
                     LIMIT {top_k}"
                ))?;

                let rows = stmt.query_map([&embedding_json], |row| {
                    let content: String = row.get(0)?;
                    let metadata: Value = row
                        .get::<_, String>(1)
                        .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
                        .unwrap_or_default();
                    let distance: f32 = row.get(2)?;
                    Ok(Candidate::new(content, metadata, 1.0 - distance))
                })?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row?);
                }
                Ok(results)
            })
            .await
            .map_err(StoreError::from)
    }

    async fn delete_by_source(&self, source: &str) -> Result<usize, StoreError> {
        let source = source.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM chunk_vectors WHERE rowid IN \
                     (SELECT rowid FROM chunks WHERE source = ?)",
                    [&source],
                )?;
                let deleted = tx.execute("DELETE FROM chunks WHERE source = ?", [&source])?;
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(StoreError::from)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(StoreError::from)
    }

    async fn reset(&self) -> Result<usize, StoreError> {
        self.conn
            .call(|conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM chunk_vectors", [])?;
                let deleted = tx.execute("DELETE FROM chunks", [])?;
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(StoreError::from)
    }
}

/// Registers sqlite-vec as an auto-extension so every subsequent connection
/// gets the vec0 module. Process-wide; safe to call repeatedly.
fn register_sqlite_vec() -> Result<(), StoreError> {
    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != ffi::SQLITE_OK {
                Err(format!("failed to register sqlite-vec extension (code {rc})"))
            } else {
                Ok(())
            }
        };
        *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
    });

    INIT_RESULT
        .lock()
        .expect("init result mutex poisoned")
        .clone()
        .expect("init was called but result not set")
        .map_err(StoreError::Unavailable)
}
