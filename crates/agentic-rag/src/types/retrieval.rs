//! Retrieval and re-ranking results

use serde::{Deserialize, Serialize};

use super::document::Chunk;

/// A chunk returned by similarity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHit {
    /// The matched chunk
    pub chunk: Chunk,
    /// Cosine similarity to the query (higher is more similar)
    pub score: f32,
}

/// A retrieval hit after second-pass scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankedHit {
    /// The original retrieval hit
    pub hit: RetrievalHit,
    /// Relevance score assigned by the re-ranker
    pub rerank_score: f32,
}

impl RerankedHit {
    /// The underlying chunk
    pub fn chunk(&self) -> &Chunk {
        &self.hit.chunk
    }
}

/// Output of the re-ranking stage
#[derive(Debug, Clone, Default)]
pub struct RerankOutcome {
    /// Hits in descending relevance order
    pub hits: Vec<RerankedHit>,
    /// Set when the scorer failed and retrieval order was kept
    pub fallback: bool,
}
