//! Retrieval agent: one similarity search followed by one rerank batch

use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::observability::PipelineTracer;
use crate::rag::{FormattedHit, Reranker, Retriever};
use crate::types::RerankOutcome;

/// What the retrieval step found
#[derive(Debug, Clone, Default)]
pub struct RetrievalOutcome {
    /// Every hit returned by the similarity search, most similar first
    pub retrieved: Vec<FormattedHit>,
    /// Hits kept after re-ranking
    pub reranked: RerankOutcome,
}

pub struct RetrievalAgent {
    retriever: Retriever,
    reranker: Reranker,
    tracer: Arc<PipelineTracer>,
}

impl RetrievalAgent {
    pub fn new(retriever: Retriever, reranker: Reranker, tracer: Arc<PipelineTracer>) -> Self {
        Self {
            retriever,
            reranker,
            tracer,
        }
    }

    pub async fn run(&self, trace_id: &str, query: &str) -> Result<RetrievalOutcome> {
        let started = Instant::now();
        let hits = self.retriever.retrieve(query, None).await?;
        let retrieved = Retriever::format_hits(&hits);
        self.tracer.trace_retrieval(trace_id, query, &retrieved, started);

        let started = Instant::now();
        let input_count = hits.len();
        let reranked = self.reranker.rerank(query, hits, None).await;
        self.tracer.trace_rerank(
            trace_id,
            self.reranker.scorer_name(),
            input_count,
            reranked.hits.len(),
            reranked.fallback,
            started,
        );

        Ok(RetrievalOutcome { retrieved, reranked })
    }
}
