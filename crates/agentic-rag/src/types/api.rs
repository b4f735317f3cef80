//! Request and response bodies of the native HTTP API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::conversation::Message;

/// Structured pointer from an answer back to a supporting chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    /// Id of the cited chunk, as returned by retrieval
    pub chunk_id: String,
    /// Source document file name, `"Unknown"` when missing
    pub document_name: String,
    /// Page number (if applicable)
    pub page_number: Option<u32>,
    /// Re-rank score of the cited chunk
    pub score: f32,
    /// Excerpt of the chunk text
    pub text: String,
}

impl Citation {
    /// Format as `name (Page n)`
    pub fn format_source(&self) -> String {
        match self.page_number {
            Some(page) => format!("{} (Page {})", self.document_name, page),
            None => self.document_name.clone(),
        }
    }
}

/// Pipeline bookkeeping returned alongside an answer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub query: String,
    pub trace_id: String,
    pub retrieved_count: usize,
    pub reranked_count: usize,
    pub citations_count: usize,
    pub rerank_fallback: bool,
    pub duration_ms: u64,
}

/// POST /chat body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

/// POST /chat response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
    pub citations: Vec<Citation>,
    pub metadata: PipelineMetadata,
}

/// POST /conversations body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Conversation summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// GET /conversations/{id} response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistoryResponse {
    pub conversation_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST /documents/ingest body
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub file_path: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// POST /documents/ingest response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub chunks_created: usize,
}

/// Overall service status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// GET /health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub services: BTreeMap<String, String>,
}

impl HealthResponse {
    /// Build from per-dependency results; any failure makes the service degraded
    pub fn from_checks(checks: Vec<(&str, Result<(), String>)>) -> Self {
        let mut services = BTreeMap::new();
        let mut healthy = true;
        for (name, result) in checks {
            let value = match result {
                Ok(()) => "healthy".to_string(),
                Err(reason) => {
                    healthy = false;
                    format!("unhealthy: {}", reason)
                }
            };
            services.insert(name.to_string(), value);
        }

        Self {
            status: if healthy {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            timestamp: Utc::now(),
            services,
        }
    }
}
