//! agentic-rag: retrieval-augmented question answering with cited sources
//!
//! Documents are parsed, chunked, embedded and stored in a SQLite-backed
//! vector index. Each question runs through a short agent pipeline (query
//! understanding, retrieval, re-ranking, answer generation) and comes back
//! with citations to the chunks it was grounded on. The HTTP layer exposes a
//! chat API, conversation history and an OpenAI-compatible endpoint.

pub mod agents;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod ingestion;
pub mod memory;
pub mod observability;
pub mod providers;
pub mod rag;
pub mod server;
pub mod types;

#[cfg(test)]
mod test_support;

pub use agents::{Orchestrator, PipelineResult};
pub use config::RagConfig;
pub use error::{Error, Result};
pub use types::{
    api::{Citation, PipelineMetadata},
    conversation::{Message, Role, Turn},
    document::{Chunk, ChunkSource, Document, FileType},
};
