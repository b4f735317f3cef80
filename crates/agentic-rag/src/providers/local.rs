//! Local vector index persisted in SQLite
//!
//! Chunks and their embeddings live in the `document_vectors` table; a copy
//! is held in memory and searched brute-force by cosine similarity.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkSource, RetrievalHit};

use super::vector_store::VectorStoreProvider;

/// Index state shared with blocking tasks
struct IndexInner {
    conn: Mutex<Connection>,
    chunks: RwLock<Vec<Chunk>>,
    dimensions: usize,
}

/// SQLite-backed vector index
pub struct SqliteVectorIndex {
    inner: Arc<IndexInner>,
}

impl SqliteVectorIndex {
    /// Open (or create) the index in the database at `path`
    pub fn open<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::vector_index(format!("Failed to open index database: {}", e)))?;
        Self::from_connection(conn, dimensions)
    }

    /// Create an in-memory index (for testing)
    #[cfg(test)]
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::vector_index(format!("Failed to open in-memory index: {}", e)))?;
        Self::from_connection(conn, dimensions)
    }

    fn from_connection(conn: Connection, dimensions: usize) -> Result<Self> {
        let inner = IndexInner {
            conn: Mutex::new(conn),
            chunks: RwLock::new(Vec::new()),
            dimensions,
        };
        inner.migrate()?;
        inner.load()?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Run a blocking index operation off the async runtime
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&IndexInner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }
}

impl IndexInner {
    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS document_vectors (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                source TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                total_chunks INTEGER NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_document_vectors_document_id
                ON document_vectors(document_id);
            "#,
        )
        .map_err(|e| Error::vector_index(format!("Failed to migrate index: {}", e)))?;
        Ok(())
    }

    /// Load persisted chunks into memory, skipping rows of the wrong dimension
    fn load(&self) -> Result<()> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, document_id, content, embedding, source, chunk_index, total_chunks, metadata
                 FROM document_vectors ORDER BY document_id, chunk_index",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(StoredRow {
                        id: row.get(0)?,
                        document_id: row.get(1)?,
                        content: row.get(2)?,
                        embedding: row.get(3)?,
                        source: row.get(4)?,
                        chunk_index: row.get(5)?,
                        total_chunks: row.get(6)?,
                        metadata: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut loaded = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for row in rows {
            let chunk = row.into_chunk()?;
            if chunk.embedding.len() == self.dimensions {
                loaded.push(chunk);
            } else {
                skipped += 1;
            }
        }

        if skipped > 0 {
            tracing::warn!(
                "Skipped {} stored vectors whose dimension differs from {}",
                skipped,
                self.dimensions
            );
        }
        tracing::info!("Vector index loaded with {} chunks", loaded.len());
        *self.chunks.write() = loaded;
        Ok(())
    }

    fn validate(&self, chunk: &Chunk) -> Result<()> {
        if chunk.embedding.is_empty() {
            return Err(Error::vector_index(format!(
                "Chunk {} has no embedding",
                chunk.id
            )));
        }
        if chunk.embedding.len() != self.dimensions {
            return Err(Error::vector_index(format!(
                "Chunk {} has {} dimensions, index expects {}",
                chunk.id,
                chunk.embedding.len(),
                self.dimensions
            )));
        }
        Ok(())
    }

    fn insert(&self, chunks: &[Chunk]) -> Result<()> {
        for chunk in chunks {
            self.validate(chunk)?;
        }

        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO document_vectors
                     (id, document_id, content, embedding, source, chunk_index, total_chunks, metadata, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )?;
                let now = chrono::Utc::now().to_rfc3339();
                for chunk in chunks {
                    stmt.execute(params![
                        chunk.id.to_string(),
                        chunk.document_id.to_string(),
                        chunk.content,
                        embedding_to_bytes(&chunk.embedding),
                        serde_json::to_string(&chunk.source)?,
                        chunk.chunk_index,
                        chunk.total_chunks,
                        serde_json::to_string(&chunk.metadata)?,
                        now,
                    ])?;
                }
            }
            tx.commit()?;
        }

        let mut cache = self.chunks.write();
        for chunk in chunks {
            cache.retain(|c| c.id != chunk.id);
            cache.push(chunk.clone());
        }
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<RetrievalHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions {
            return Err(Error::vector_index(format!(
                "Query has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }

        let cache = self.chunks.read();
        let mut scored: Vec<(usize, f32)> = cache
            .iter()
            .enumerate()
            .map(|(i, chunk)| (i, cosine_similarity(query, &chunk.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| RetrievalHit {
                chunk: cache[i].clone(),
                score,
            })
            .collect())
    }

    fn delete_by_document(&self, document_id: &Uuid) -> Result<usize> {
        let deleted = {
            let conn = self.conn.lock();
            conn.execute(
                "DELETE FROM document_vectors WHERE document_id = ?1",
                params![document_id.to_string()],
            )?
        };
        self.chunks.write().retain(|c| c.document_id != *document_id);
        Ok(deleted)
    }

    fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

#[async_trait]
impl VectorStoreProvider for SqliteVectorIndex {
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let chunks = chunks.to_vec();
        let count = chunks.len();
        self.blocking(move |inner| inner.insert(&chunks)).await?;
        tracing::debug!("Inserted {} chunks into vector index", count);
        Ok(())
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<RetrievalHit>> {
        let query = query_embedding.to_vec();
        self.blocking(move |inner| inner.search(&query, top_k)).await
    }

    async fn get_chunk(&self, chunk_id: &Uuid) -> Result<Option<Chunk>> {
        Ok(self
            .inner
            .chunks
            .read()
            .iter()
            .find(|c| c.id == *chunk_id)
            .cloned())
    }

    async fn delete_by_document(&self, document_id: &Uuid) -> Result<usize> {
        let doc_id = *document_id;
        self.blocking(move |inner| inner.delete_by_document(&doc_id)).await
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.chunks.read().len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.inner.ping().is_ok())
    }

    fn name(&self) -> &str {
        "sqlite-cosine"
    }
}

/// Raw `document_vectors` row
struct StoredRow {
    id: String,
    document_id: String,
    content: String,
    embedding: Vec<u8>,
    source: String,
    chunk_index: u32,
    total_chunks: u32,
    metadata: String,
}

impl StoredRow {
    fn into_chunk(self) -> Result<Chunk> {
        let source: ChunkSource = serde_json::from_str(&self.source)?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_str(&self.metadata)?;
        Ok(Chunk {
            id: parse_uuid(&self.id)?,
            document_id: parse_uuid(&self.document_id)?,
            content: self.content,
            embedding: bytes_to_embedding(&self.embedding),
            source,
            chunk_index: self.chunk_index,
            total_chunks: self.total_chunks,
            metadata,
        })
    }
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::vector_index(format!("Invalid id {}: {}", value, e)))
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity, 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
