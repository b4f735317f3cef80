//! Vector store provider trait for storing and searching embeddings

use async_trait::async_trait;
use uuid::Uuid;
use crate::error::Result;
use crate::types::{Chunk, RetrievalHit};

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `SqliteVectorIndex`: SQLite-persisted chunks with in-memory cosine search
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert chunks that already carry their embeddings
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Search for the `top_k` most similar chunks, most similar first
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<RetrievalHit>>;

    /// Fetch a chunk by ID
    async fn get_chunk(&self, chunk_id: &Uuid) -> Result<Option<Chunk>>;

    /// Delete all chunks for a document
    async fn delete_by_document(&self, document_id: &Uuid) -> Result<usize>;

    /// Get total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
