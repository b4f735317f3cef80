//! Vector retrieval over the chunk index

use serde::Serialize;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::types::RetrievalHit;

/// Prompt- and trace-friendly view of a retrieved node
#[derive(Debug, Clone, Serialize)]
pub struct FormattedHit {
    pub node_id: String,
    pub text: String,
    pub score: f32,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Embeds a query and searches the index
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorStoreProvider>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        config: &RetrievalConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k: config.top_k_retrieval,
        }
    }

    /// One embedding call and one similarity search; hits are most similar first
    pub async fn retrieve(&self, query: &str, top_k: Option<usize>) -> Result<Vec<RetrievalHit>> {
        let top_k = top_k.unwrap_or(self.top_k);
        let embedding = self.embedder.embed(query).await?;
        let hits = self.index.search(&embedding, top_k).await?;
        tracing::info!("Retrieved {} nodes for query", hits.len());
        Ok(hits)
    }

    /// Format hits for prompts and traces
    pub fn format_hits(hits: &[RetrievalHit]) -> Vec<FormattedHit> {
        hits.iter()
            .map(|hit| FormattedHit {
                node_id: hit.chunk.id.to_string(),
                text: hit.chunk.content.clone(),
                score: hit.score,
                metadata: hit.chunk.node_metadata(),
            })
            .collect()
    }
}
