//! Document loading for PDF, Word, text and Markdown files

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::FileType;

/// File-level metadata recorded for every ingested document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub file_name: String,
    pub file_path: String,
    pub file_type: FileType,
    pub file_size: u64,
    pub pages: Option<u32>,
}

/// Content from a single page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Text content of the page
    pub content: String,
}

/// Parsed document with extracted text and metadata
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Extracted text content
    pub content: String,
    /// Content hash (sha256, hex)
    pub content_hash: String,
    /// Page-level content; empty for formats without pages
    pub pages: Vec<PageContent>,
    /// File metadata
    pub metadata: DocumentMetadata,
}

/// Extracted PDF text; `pages` is empty when page boundaries are unknown
#[derive(Debug)]
struct PdfText {
    content: String,
    pages: Vec<PageContent>,
    page_count: Option<u32>,
}

/// Loads supported files from disk into [`ParsedDocument`]s
pub struct DocumentProcessor;

impl DocumentProcessor {
    /// Parse a single file
    pub fn process_file(path: &Path) -> Result<ParsedDocument> {
        if !path.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )));
        }

        let file_type = FileType::from_path(path);
        if !file_type.is_supported() {
            return Err(Error::UnsupportedFileType(path.display().to_string()));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let data = std::fs::read(path)?;
        let (content, pages, page_count) = match file_type {
            FileType::Pdf => {
                let pdf = Self::parse_pdf(&file_name, &data)?;
                (pdf.content, pdf.pages, pdf.page_count)
            }
            FileType::Docx => (Self::parse_docx(&file_name, &data)?, Vec::new(), None),
            FileType::Txt | FileType::Markdown => (Self::parse_text(&data), Vec::new(), None),
            FileType::Unknown => return Err(Error::UnsupportedFileType(file_name)),
        };

        if content.trim().is_empty() {
            return Err(Error::file_parse(file_name, "No text content could be extracted"));
        }

        tracing::debug!(
            "Parsed {} ({} chars, {:?} pages)",
            file_name,
            content.len(),
            page_count
        );

        Ok(ParsedDocument {
            content_hash: hash_content(&content),
            content,
            pages,
            metadata: DocumentMetadata {
                file_name,
                file_path: path.display().to_string(),
                file_type,
                file_size: data.len() as u64,
                pages: page_count,
            },
        })
    }

    /// Supported files under `dir`, sorted by path
    pub fn collect_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Directory not found: {}", dir.display()),
            )));
        }

        let walker = WalkDir::new(dir).max_depth(if recursive { usize::MAX } else { 1 });
        let mut files: Vec<PathBuf> = walker
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| FileType::from_path(path).is_supported())
            .collect();

        files.sort();
        Ok(files)
    }

    /// Parse every supported file under `dir`; failures are logged and skipped
    pub fn process_directory(dir: &Path, recursive: bool) -> Result<Vec<ParsedDocument>> {
        let files = Self::collect_files(dir, recursive)?;
        let mut documents = Vec::with_capacity(files.len());

        for path in files {
            match Self::process_file(&path) {
                Ok(doc) => documents.push(doc),
                Err(e) => tracing::warn!("Failed to load {}: {}", path.display(), e),
            }
        }

        tracing::info!("Loaded {} documents from {}", documents.len(), dir.display());
        Ok(documents)
    }

    /// Parse PDF page by page, falling back to whole-document extraction
    fn parse_pdf(file_name: &str, data: &[u8]) -> Result<PdfText> {
        let mut pages = Vec::new();
        let mut page_count = None;

        match lopdf::Document::load_mem(data) {
            Ok(doc) => {
                let page_numbers = doc.get_pages();
                page_count = Some(page_numbers.len() as u32);
                for page_number in page_numbers.keys().copied() {
                    let text = doc.extract_text(&[page_number]).unwrap_or_default();
                    pages.push(PageContent {
                        page_number,
                        content: clean_text(&text),
                    });
                }
            }
            Err(e) => tracing::warn!("lopdf could not open {}: {}", file_name, e),
        }

        Self::pdf_text(file_name, pages, page_count, || {
            pdf_extract::extract_text_from_mem(data).map_err(|e| e.to_string())
        })
    }

    /// Keep per-page text when any page has some; otherwise use
    /// `whole_document`, whose text has no page boundaries
    fn pdf_text<F>(
        file_name: &str,
        pages: Vec<PageContent>,
        page_count: Option<u32>,
        whole_document: F,
    ) -> Result<PdfText>
    where
        F: FnOnce() -> std::result::Result<String, String>,
    {
        if pages.iter().any(|p| !p.content.trim().is_empty()) {
            let content = pages
                .iter()
                .map(|p| p.content.as_str())
                .filter(|c| !c.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n\n");
            return Ok(PdfText {
                content,
                pages,
                page_count,
            });
        }

        let text = whole_document().map_err(|e| Error::file_parse(file_name, e))?;
        tracing::debug!(
            "Used whole-document extraction for {} ({:?} pages)",
            file_name,
            page_count
        );
        Ok(PdfText {
            content: clean_text(&text),
            pages: Vec::new(),
            page_count,
        })
    }

    /// Parse DOCX paragraphs
    fn parse_docx(file_name: &str, data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::file_parse(file_name, e.to_string()))?;

        let mut paragraphs = Vec::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                let mut text = String::new();
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
                if !text.trim().is_empty() {
                    paragraphs.push(text);
                }
            }
        }

        Ok(paragraphs.join("\n\n"))
    }

    /// Parse plain text or markdown
    fn parse_text(data: &[u8]) -> String {
        String::from_utf8_lossy(data).to_string()
    }
}

/// Strip NUL bytes and trailing whitespace; keep paragraph breaks
fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.replace('\0', "").lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run == 1 && !out.is_empty() {
                out.push('\n');
            }
            continue;
        }
        blank_run = 0;
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

/// Hash content for document identity
pub(crate) fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
