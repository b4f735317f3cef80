//! Document ingestion: loading, chunking and indexing

pub mod chunker;
pub mod parser;
pub mod pipeline;

pub use chunker::TextChunker;
pub use parser::{DocumentMetadata, DocumentProcessor, PageContent, ParsedDocument};
pub use pipeline::{IngestOutcome, IngestPipeline};
