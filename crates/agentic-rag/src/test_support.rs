//! In-process providers for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, GenerationOptions, LlmProvider};
use crate::rag::reranker::RelevanceScorer;
use crate::types::{Chunk, ChunkSource, FileType, RetrievalHit};

pub const DIMS: usize = 16;

/// Deterministic bag-of-words embedder: each lowercase word hashes to a bucket
pub struct HashEmbedder;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; DIMS];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
                % DIMS;
            v[bucket] += 1.0;
        }
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// LLM that records prompts and replies from a script
pub struct ScriptedLlm {
    reply: Box<dyn Fn(&str) -> Result<String> + Send + Sync>,
    pub prompts: Mutex<Vec<String>>,
    pub options: Mutex<Vec<GenerationOptions>>,
    healthy: bool,
}

impl ScriptedLlm {
    pub fn new<F>(reply: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            reply: Box::new(reply),
            prompts: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
            healthy: true,
        }
    }

    /// Always answers with `text`
    pub fn fixed(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Always fails
    pub fn failing() -> Self {
        let mut llm = Self::new(|_| Err(Error::llm("model unavailable")));
        llm.healthy = false;
        llm
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        self.options.lock().push(*options);
        (self.reply)(prompt)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.healthy)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

/// Scorer that always fails
pub struct FailingScorer;

#[async_trait]
impl RelevanceScorer for FailingScorer {
    async fn score(&self, _query: &str, _passages: &[&str]) -> Result<Vec<f32>> {
        Err(Error::Rerank("scorer offline".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Build a retrieval hit over a synthetic chunk
pub fn hit(file_name: &str, index: u32, content: &str, score: f32) -> RetrievalHit {
    let source = ChunkSource {
        file_name: file_name.to_string(),
        file_path: format!("/docs/{}", file_name),
        file_type: FileType::from_path(std::path::Path::new(file_name)),
        page_number: Some(index + 1),
        page_count: None,
    };
    let mut chunk = Chunk::new(Uuid::new_v4(), content.to_string(), source, index);
    chunk.total_chunks = index + 1;
    RetrievalHit { chunk, score }
}
