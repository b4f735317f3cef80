//! Configuration for the RAG service
//!
//! Values are resolved in three layers: built-in defaults, an optional TOML
//! file, then environment variables (a `.env` file is loaded first). The
//! resolved [`RagConfig`] is handed to every component constructor.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Main RAG service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Conversation database configuration
    pub database: DatabaseConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Re-ranker configuration
    pub reranker: RerankerConfig,
    /// Tracing and prompt registry configuration
    pub observability: ObservabilityConfig,
    /// Conversation memory configuration
    pub conversation: ConversationConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Prefix all API routes are nested under
    pub api_prefix: String,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_prefix: "/api/v1".to_string(),
            enable_cors: true,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Conversation database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file holding conversations and the vector index
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agentic-rag")
            .join("agentic-rag.db");
        Self { path }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub model: String,
    /// Default sampling temperature
    pub temperature: f32,
    /// Default completion length limit (tokens)
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for failed requests (0 disables retrying)
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            timeout_secs: 120,
            max_retries: 0,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama embedding model
    pub model: String,
    /// Embedding dimensions
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Nodes fetched from the vector index per query
    pub top_k_retrieval: usize,
    /// Nodes kept after re-ranking
    pub top_k_rerank: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k_retrieval: 10,
            top_k_rerank: 3,
        }
    }
}

/// Which pair scorer the re-ranker uses
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RerankerBackend {
    /// Term-overlap scorer, no model files needed
    #[default]
    Lexical,
    /// ONNX cross-encoder (requires the `cross-encoder` feature)
    CrossEncoder,
}

impl FromStr for RerankerBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lexical" => Ok(Self::Lexical),
            "cross-encoder" | "cross_encoder" | "crossencoder" => Ok(Self::CrossEncoder),
            other => Err(Error::Config(format!("Unknown reranker backend: {}", other))),
        }
    }
}

/// Re-ranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    /// Scorer backend
    pub backend: RerankerBackend,
    /// Cross-encoder model name
    pub model: String,
    /// Directory holding `model.onnx` and `tokenizer.json`
    pub cache_dir: PathBuf,
    /// Maximum (query, passage) sequence length
    pub max_length: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            backend: RerankerBackend::Lexical,
            model: "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string(),
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("agentic-rag")
                .join("reranker"),
            max_length: 512,
        }
    }
}

/// Tracing and prompt registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter directive level
    pub log_level: String,
    /// Project name attached to every span
    pub project_name: String,
    /// Optional trace collector base URL, probed by the health endpoint
    pub collector_url: Option<String>,
    /// Optional directory of `{name}.txt` prompt overrides
    pub prompts_dir: Option<PathBuf>,
    /// Spans kept in memory
    pub span_buffer: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            project_name: "agentic_rag".to_string(),
            collector_url: None,
            prompts_dir: None,
            span_buffer: 1024,
        }
    }
}

/// Conversation memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Prior messages fed to the pipeline as history
    pub history_window: usize,
    /// Messages loaded per conversation by the chat endpoint
    pub history_limit: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_window: 5,
            history_limit: 50,
        }
    }
}

impl RagConfig {
    /// Resolve configuration: defaults, then `path` (if any), then environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Missing .env is fine
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| {
            Error::Config(format!("Invalid config file {}: {}", path.display(), e))
        })
    }

    /// Apply environment overrides using `lookup` to resolve variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DATABASE_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("OLLAMA_BASE_URL") {
            self.llm.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("OLLAMA_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("OLLAMA_EMBEDDING_MODEL") {
            self.embeddings.model = v;
        }
        if let Some(v) = lookup("EMBEDDING_DIMENSION") {
            self.embeddings.dimensions = parse_var("EMBEDDING_DIMENSION", &v)?;
        }
        if let Some(v) = lookup("CHUNK_SIZE") {
            self.chunking.chunk_size = parse_var("CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_var("CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("TOP_K_RETRIEVAL") {
            self.retrieval.top_k_retrieval = parse_var("TOP_K_RETRIEVAL", &v)?;
        }
        if let Some(v) = lookup("TOP_K_RERANK") {
            self.retrieval.top_k_rerank = parse_var("TOP_K_RERANK", &v)?;
        }
        if let Some(v) = lookup("API_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("API_PORT") {
            self.server.port = parse_var("API_PORT", &v)?;
        }
        if let Some(v) = lookup("API_PREFIX") {
            self.server.api_prefix = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.observability.log_level = v.to_lowercase();
        }
        if let Some(v) = lookup("TRACE_COLLECTOR_URL") {
            self.observability.collector_url = Some(v.trim_end_matches('/').to_string());
        }
        if let Some(v) = lookup("PROMPTS_DIR") {
            self.observability.prompts_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("RERANKER_BACKEND") {
            self.reranker.backend = v.parse()?;
        }
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than 0".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k_retrieval == 0 || self.retrieval.top_k_rerank == 0 {
            return Err(Error::Config("top_k values must be greater than 0".to_string()));
        }
        if !self.server.api_prefix.starts_with('/') {
            return Err(Error::Config(format!(
                "api_prefix must start with '/': {}",
                self.server.api_prefix
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embedding dimensions must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Default `EnvFilter` directive for the binaries
    pub fn log_filter(&self) -> String {
        format!(
            "agentic_rag={},tower_http=info",
            self.observability.log_level
        )
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value for {}: {}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.chunking.chunk_size, 512);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.retrieval.top_k_retrieval, 10);
        assert_eq!(config.retrieval.top_k_rerank, 3);
        assert_eq!(config.server.api_prefix, "/api/v1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.llm.model, "llama3.1:8b");
        assert_eq!(config.llm.max_retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RagConfig::default();
        config
            .apply_env(lookup(&[
                ("OLLAMA_BASE_URL", "http://ollama:11434/"),
                ("TOP_K_RERANK", "5"),
                ("API_PORT", "9000"),
                ("LOG_LEVEL", "DEBUG"),
                ("RERANKER_BACKEND", "cross-encoder"),
            ]))
            .unwrap();

        assert_eq!(config.llm.base_url, "http://ollama:11434");
        assert_eq!(config.retrieval.top_k_rerank, 5);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.reranker.backend, RerankerBackend::CrossEncoder);
    }

    #[test]
    fn test_invalid_numeric_env() {
        let mut config = RagConfig::default();
        let err = config
            .apply_env(lookup(&[("CHUNK_SIZE", "large")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_overlap() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rag.toml");
        std::fs::write(
            &path,
            "[retrieval]\ntop_k_retrieval = 20\n\n[server]\napi_prefix = \"/rag\"\n",
        )
        .unwrap();

        let config = RagConfig::from_file(&path).unwrap();
        assert_eq!(config.retrieval.top_k_retrieval, 20);
        assert_eq!(config.retrieval.top_k_rerank, 3);
        assert_eq!(config.server.api_prefix, "/rag");
        assert_eq!(config.chunking.chunk_size, 512);
    }
}
