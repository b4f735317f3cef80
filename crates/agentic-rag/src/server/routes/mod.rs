//! API routes for the RAG server

pub mod chat;
pub mod conversations;
pub mod documents;
pub mod health;
pub mod openai;

use axum::{
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes (mounted under the configured prefix)
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        // Native chat
        .route("/chat", post(chat::chat))
        // Conversation memory
        .route("/conversations", post(conversations::create_conversation))
        .route("/conversations/:id", get(conversations::get_conversation))
        // Ingestion
        .route("/documents/ingest", post(documents::ingest_document))
        // OpenAI-compatible surface
        .route("/v1/chat/completions", post(openai::chat_completions))
        .route("/v1/models", get(openai::list_models))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "agentic-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Agentic RAG service with conversation memory and cited answers",
        "endpoints": {
            "GET /health": "Dependency health",
            "POST /chat": "Chat with citations (optionally streamed)",
            "POST /conversations": "Create a conversation",
            "GET /conversations/:id": "Conversation history",
            "POST /documents/ingest": "Ingest a document from a server path",
            "POST /v1/chat/completions": "OpenAI-compatible chat completions",
            "GET /v1/models": "OpenAI-compatible model list"
        }
    }))
}
