//! Document and chunk types with source tracking for citations

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "txt" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a path's extension
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Check if this is a supported file type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Extension-style label stored in chunk metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Docx => ".docx",
            Self::Txt => ".txt",
            Self::Markdown => ".md",
            Self::Unknown => "",
        }
    }
}

/// A document that has been ingested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// File name (no directory)
    pub file_name: String,
    /// Path the document was read from
    pub file_path: String,
    /// File type
    pub file_type: FileType,
    /// Content hash (sha256, hex)
    pub content_hash: String,
    /// File size in bytes
    pub file_size: u64,
    /// Total number of pages (if applicable)
    pub total_pages: Option<u32>,
    /// Total number of chunks created
    pub total_chunks: u32,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
    /// Caller-supplied metadata, copied onto every chunk
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    /// Create a new document record
    pub fn new(
        file_name: String,
        file_path: String,
        file_type: FileType,
        content_hash: String,
        file_size: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name,
            file_path,
            file_type,
            content_hash,
            file_size,
            total_pages: None,
            total_chunks: 0,
            ingested_at: chrono::Utc::now(),
            metadata: HashMap::new(),
        }
    }
}

/// Source information for a chunk (used for citations)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkSource {
    /// File name used in citations
    pub file_name: String,
    /// Original path
    pub file_path: String,
    /// File type
    pub file_type: FileType,
    /// Page number (1-indexed, for PDFs)
    pub page_number: Option<u32>,
    /// Total pages in document
    pub page_count: Option<u32>,
}

impl ChunkSource {
    /// Format source for display
    pub fn format_citation(&self) -> String {
        match self.page_number {
            Some(page) => format!("{} (Page {})", self.file_name, page),
            None => self.file_name.clone(),
        }
    }
}

/// A chunk of text from a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Parent document ID
    pub document_id: Uuid,
    /// Text content
    pub content: String,
    /// Embedding vector
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    /// Source information for citations
    pub source: ChunkSource,
    /// Chunk index within document
    pub chunk_index: u32,
    /// Number of chunks the document was split into
    pub total_chunks: u32,
    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(document_id: Uuid, content: String, source: ChunkSource, chunk_index: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            content,
            embedding: Vec::new(),
            source,
            chunk_index,
            total_chunks: 0,
            metadata: HashMap::new(),
        }
    }

    /// Human-readable label, `"{file_name}_chunk_{index}"`
    pub fn label(&self) -> String {
        format!("{}_chunk_{}", self.source.file_name, self.chunk_index)
    }

    /// Flattened metadata as exposed to prompts, traces and API clients
    pub fn node_metadata(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut meta: serde_json::Map<String, serde_json::Value> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        meta.insert("file_name".into(), serde_json::json!(self.source.file_name));
        meta.insert("file_path".into(), serde_json::json!(self.source.file_path));
        meta.insert("file_type".into(), serde_json::json!(self.source.file_type.as_str()));
        meta.insert("chunk_id".into(), serde_json::json!(self.label()));
        meta.insert("chunk_index".into(), serde_json::json!(self.chunk_index));
        meta.insert("total_chunks".into(), serde_json::json!(self.total_chunks));
        meta.insert("document_id".into(), serde_json::json!(self.document_id.to_string()));

        if let Some(page) = self.source.page_number {
            meta.insert("page_number".into(), serde_json::json!(page));
        }
        if let Some(pages) = self.source.page_count {
            meta.insert("pages".into(), serde_json::json!(pages));
        }

        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> ChunkSource {
        ChunkSource {
            file_name: "guide.pdf".to_string(),
            file_path: "/docs/guide.pdf".to_string(),
            file_type: FileType::Pdf,
            page_number: Some(3),
            page_count: Some(10),
        }
    }

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_extension("PDF"), FileType::Pdf);
        assert_eq!(FileType::from_extension(".markdown"), FileType::Markdown);
        assert_eq!(FileType::from_path(Path::new("a/b/notes.txt")), FileType::Txt);
        assert_eq!(FileType::from_path(Path::new("archive.zip")), FileType::Unknown);
        assert_eq!(FileType::from_extension("doc"), FileType::Unknown);
        assert!(!FileType::from_path(Path::new("README")).is_supported());
    }

    #[test]
    fn test_chunk_label_and_metadata() {
        let mut chunk = Chunk::new(Uuid::new_v4(), "text".to_string(), source(), 4);
        chunk.total_chunks = 9;
        chunk
            .metadata
            .insert("department".to_string(), serde_json::json!("legal"));

        assert_eq!(chunk.label(), "guide.pdf_chunk_4");

        let meta = chunk.node_metadata();
        assert_eq!(meta["file_name"], "guide.pdf");
        assert_eq!(meta["page_number"], 3);
        assert_eq!(meta["total_chunks"], 9);
        assert_eq!(meta["file_type"], ".pdf");
        assert_eq!(meta["department"], "legal");
    }

    #[test]
    fn test_format_citation() {
        let mut src = source();
        assert_eq!(src.format_citation(), "guide.pdf (Page 3)");
        src.page_number = None;
        assert_eq!(src.format_citation(), "guide.pdf");
    }
}
