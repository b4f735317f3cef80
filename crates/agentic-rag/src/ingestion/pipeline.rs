//! Ingestion pipeline: parse, chunk, embed and index documents

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::types::Document;

use super::chunker::TextChunker;
use super::parser::{hash_content, DocumentProcessor, ParsedDocument};

/// Texts sent to the embedder per call
const EMBED_BATCH_SIZE: usize = 32;

/// Result of ingesting one document
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub document_id: Uuid,
    pub file_name: String,
    pub chunks_created: usize,
}

/// Turns files on disk into indexed chunks
pub struct IngestPipeline {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorStoreProvider>,
}

impl IngestPipeline {
    pub fn new(
        config: &ChunkingConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        Self {
            chunker: TextChunker::from_config(config),
            embedder,
            index,
        }
    }

    /// Ingest a single file. Re-ingesting the same path and content replaces its chunks.
    pub async fn ingest_file(
        &self,
        path: &Path,
        extra_metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<IngestOutcome> {
        let owned = path.to_path_buf();
        let parsed = tokio::task::spawn_blocking(move || DocumentProcessor::process_file(&owned))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        self.ingest_parsed(parsed, extra_metadata).await
    }

    /// Ingest an already parsed document
    pub async fn ingest_parsed(
        &self,
        parsed: ParsedDocument,
        extra_metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<IngestOutcome> {
        let start = Instant::now();
        let meta = &parsed.metadata;

        let mut doc = Document::new(
            meta.file_name.clone(),
            meta.file_path.clone(),
            meta.file_type,
            parsed.content_hash.clone(),
            meta.file_size,
        );
        doc.id = document_id(&meta.file_path, &parsed.content_hash);
        doc.total_pages = meta.pages;
        if let Some(extra) = extra_metadata {
            doc.metadata.extend(extra);
        }

        let mut chunks = self.chunker.chunk_document(&doc, &parsed);
        if chunks.is_empty() {
            return Err(Error::file_parse(&doc.file_name, "Document produced no chunks"));
        }
        doc.total_chunks = chunks.len() as u32;

        for batch in chunks.chunks_mut(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }
            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }
        }

        let replaced = self.index.delete_by_document(&doc.id).await?;
        if replaced > 0 {
            tracing::info!("Replacing {} existing chunks of {}", replaced, doc.file_name);
        }
        self.index.insert_chunks(&chunks).await?;

        tracing::info!(
            "Ingested {} ({} chunks) in {}ms",
            doc.file_name,
            chunks.len(),
            start.elapsed().as_millis()
        );

        Ok(IngestOutcome {
            document_id: doc.id,
            file_name: doc.file_name,
            chunks_created: chunks.len(),
        })
    }

    /// Ingest a file, or every supported file in a directory.
    ///
    /// Directory members that fail are logged and skipped.
    pub async fn ingest_path(&self, path: &Path, recursive: bool) -> Result<Vec<IngestOutcome>> {
        if path.is_file() {
            return Ok(vec![self.ingest_file(path, None).await?]);
        }

        let files: Vec<PathBuf> = DocumentProcessor::collect_files(path, recursive)?;
        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            match self.ingest_file(&file, None).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::warn!("Skipping {}: {}", file.display(), e),
            }
        }
        Ok(outcomes)
    }
}

/// Stable document ID derived from path and content
fn document_id(file_path: &str, content_hash: &str) -> Uuid {
    let digest = hash_content(&format!("{}\0{}", file_path, content_hash));
    let mut bytes = [0u8; 16];
    if let Ok(decoded) = hex::decode(&digest[..32]) {
        bytes.copy_from_slice(&decoded);
    }
    Uuid::from_bytes(bytes)
}
