//! Retrieval, re-ranking and citation handling

pub mod citation;
pub mod reranker;
pub mod retriever;

pub use reranker::{LexicalScorer, RelevanceScorer, Reranker};
pub use retriever::{FormattedHit, Retriever};
