//! Provider abstractions for embeddings, LLM and vector storage
//!
//! The pipeline only talks to these traits; the concrete Ollama and SQLite
//! implementations are wired up once at startup.

pub mod embedding;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::{GenerationOptions, LlmProvider};
pub use local::SqliteVectorIndex;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
pub use vector_store::VectorStoreProvider;
