//! Core types for the RAG service

pub mod api;
pub mod conversation;
pub mod document;
pub mod openai;
pub mod retrieval;

pub use api::{Citation, PipelineMetadata};
pub use conversation::{Conversation, ConversationHistory, Message, Role, Turn};
pub use document::{Chunk, ChunkSource, Document, FileType};
pub use retrieval::{RerankOutcome, RerankedHit, RetrievalHit};
