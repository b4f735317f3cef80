//! Sentence-aware text chunking with page tracking

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, ChunkSource, Document};
use super::parser::ParsedDocument;

/// Text chunker with configurable size and overlap (both in characters)
pub struct TextChunker {
    /// Target chunk size
    chunk_size: usize,
    /// Overlap carried into the next chunk
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Create from configuration
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Chunk a parsed document, keeping page numbers for paginated formats
    pub fn chunk_document(&self, doc: &Document, parsed: &ParsedDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let page_count = parsed.metadata.pages;

        let sections: Vec<(Option<u32>, &str)> = if parsed.pages.is_empty() {
            vec![(None, parsed.content.as_str())]
        } else {
            parsed
                .pages
                .iter()
                .map(|p| (Some(p.page_number), p.content.as_str()))
                .collect()
        };

        for (page_number, text) in sections {
            for piece in self.split_text(text) {
                let source = ChunkSource {
                    file_name: doc.file_name.clone(),
                    file_path: doc.file_path.clone(),
                    file_type: doc.file_type,
                    page_number,
                    page_count,
                };
                let mut chunk = Chunk::new(doc.id, piece, source, chunks.len() as u32);
                chunk.metadata = doc.metadata.clone();
                chunks.push(chunk);
            }
        }

        let total = chunks.len() as u32;
        for chunk in &mut chunks {
            chunk.total_chunks = total;
        }

        chunks
    }

    /// Split text into overlapping chunks. Non-blank text yields at least one chunk.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;
        // False while `current` only holds overlap from the previous chunk
        let mut has_new = false;

        for unit in self.units(text) {
            let unit_len = unit.chars().count();

            // If adding this unit exceeds chunk size, save current chunk
            if has_new && current_len + unit_len > self.chunk_size {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }

                // Start new chunk with overlap
                current = self.get_overlap_text(&current);
                current_len = current.chars().count();
                if current_len + unit_len > self.chunk_size {
                    current.clear();
                    current_len = 0;
                }
                has_new = false;
            }

            current.push_str(unit);
            current_len += unit_len;
            has_new = true;
        }

        let trimmed = current.trim();
        if has_new && !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        chunks
    }

    /// Sentences, with oversized sentences broken at word boundaries
    fn units<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut units = Vec::new();
        for sentence in text.split_sentence_bounds() {
            if sentence.chars().count() <= self.chunk_size {
                units.push(sentence);
                continue;
            }

            let mut start = 0usize;
            let mut len = 0usize;
            for (offset, word) in sentence.split_word_bound_indices() {
                let word_len = word.chars().count();
                if len > 0 && len + word_len > self.chunk_size {
                    units.push(&sentence[start..offset]);
                    start = offset;
                    len = 0;
                }
                if word_len > self.chunk_size {
                    // Single token longer than a chunk: hard split on char boundaries
                    for (i, (byte, _)) in word.char_indices().enumerate() {
                        if i > 0 && i % self.chunk_size == 0 {
                            units.push(&sentence[start..offset + byte]);
                            start = offset + byte;
                        }
                    }
                    len = sentence[start..offset + word.len()].chars().count();
                    continue;
                }
                len += word_len;
            }
            if start < sentence.len() {
                units.push(&sentence[start..]);
            }
        }
        units
    }

    /// Get overlap text from the end of a chunk
    fn get_overlap_text(&self, text: &str) -> String {
        if self.overlap == 0 {
            return String::new();
        }

        let total = text.chars().count();
        if total <= self.overlap {
            return text.to_string();
        }

        let start = text
            .char_indices()
            .nth(total - self.overlap)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let overlap_text = &text[start..];

        // Try to start at a sentence boundary
        if let Some(pos) = overlap_text.find(". ") {
            if !overlap_text[pos + 2..].trim().is_empty() {
                return overlap_text[pos + 2..].to_string();
            }
        }

        // Fall back to word boundary
        if let Some(pos) = overlap_text.find(' ') {
            return overlap_text[pos + 1..].to_string();
        }

        overlap_text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::parser::{DocumentMetadata, PageContent};
    use crate::types::FileType;

    fn parsed(content: &str, pages: Vec<PageContent>) -> ParsedDocument {
        ParsedDocument {
            content: content.to_string(),
            content_hash: "h".to_string(),
            pages,
            metadata: DocumentMetadata {
                file_name: "manual.pdf".to_string(),
                file_path: "/docs/manual.pdf".to_string(),
                file_type: FileType::Pdf,
                file_size: 10,
                pages: Some(2),
            },
        }
    }

    fn document() -> Document {
        Document::new(
            "manual.pdf".to_string(),
            "/docs/manual.pdf".to_string(),
            FileType::Pdf,
            "h".to_string(),
            10,
        )
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = TextChunker::new(512, 50);
        let chunks = chunker.split_text("Tiny.");
        assert_eq!(chunks, vec!["Tiny."]);
        assert!(chunker.split_text("   ").is_empty());
    }

    #[test]
    fn test_chunks_respect_size() {
        let chunker = TextChunker::new(100, 20);
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let chunks = chunker.split_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_overlap_carries_text() {
        let chunker = TextChunker::new(60, 25);
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu. Nu xi omicron pi.";
        let chunks = chunker.split_text(text);
        assert!(chunks.len() >= 2);

        let tail: String = chunks[0].split_whitespace().last().unwrap().to_string();
        assert!(chunks[1].contains(&tail));
    }

    #[test]
    fn test_long_word_is_split() {
        let chunker = TextChunker::new(10, 0);
        let chunks = chunker.split_text(&"x".repeat(35));
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat().len(), 35);
    }

    #[test]
    fn test_multibyte_text() {
        let chunker = TextChunker::new(8, 3);
        let chunks = chunker.split_text("ünïcödé wörds ärë fïnë hërë");
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 8));
    }

    #[test]
    fn test_chunk_document_pages_and_metadata() {
        let chunker = TextChunker::new(512, 50);
        let parsed = parsed(
            "Page one text.\n\nPage two text.",
            vec![
                PageContent { page_number: 1, content: "Page one text.".to_string() },
                PageContent { page_number: 2, content: "Page two text.".to_string() },
            ],
        );
        let mut doc = document();
        doc.metadata.insert("team".to_string(), serde_json::json!("docs"));

        let chunks = chunker.chunk_document(&doc, &parsed);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source.page_number, Some(1));
        assert_eq!(chunks[1].source.page_number, Some(2));
        assert_eq!(chunks[1].chunk_index, 1);
        assert!(chunks.iter().all(|c| c.total_chunks == 2));
        assert!(chunks.iter().all(|c| c.source.file_name == "manual.pdf"));
        assert_eq!(chunks[0].metadata["team"], "docs");
        assert_eq!(chunks[1].label(), "manual.pdf_chunk_1");
    }
}
