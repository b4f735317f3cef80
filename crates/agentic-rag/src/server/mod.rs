//! HTTP server for the RAG service

pub mod routes;
pub mod state;

use axum::{extract::DefaultBodyLimit, Router};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
pub use state::AppState;

/// RAG HTTP Server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a new RAG server
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = build_router(self.state);

        tracing::info!("Starting RAG server on http://{}", addr);
        tracing::info!("API root: http://{}{}", addr, self.config.server.api_prefix);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Build the router with all routes under the configured API prefix
pub fn build_router(state: AppState) -> Router {
    let server = &state.config().server;
    let prefix = server.api_prefix.trim_end_matches('/').to_string();
    let max_body = server.max_body_size;
    let enable_cors = server.enable_cors;

    let api = routes::api_routes();
    let router = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&prefix, api)
    };

    let router = router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(max_body)),
    );

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ConversationStore;
    use crate::providers::{EmbeddingProvider, SqliteVectorIndex, VectorStoreProvider};
    use crate::rag::{LexicalScorer, Reranker};
    use crate::test_support::{hit, HashEmbedder, ScriptedLlm, DIMS};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const ANSWER: &str = "Badges are issued at the front desk [Source 1].";

    async fn app_with(llm: ScriptedLlm) -> (Router, Arc<ScriptedLlm>) {
        app_with_config(llm, RagConfig::default()).await
    }

    async fn app_with_config(llm: ScriptedLlm, config: RagConfig) -> (Router, Arc<ScriptedLlm>) {
        let index = Arc::new(SqliteVectorIndex::in_memory(DIMS).unwrap());
        let mut chunks = Vec::new();
        for (i, text) in [
            "Badges are issued at the front desk on your first day.",
            "The office closes at six in the evening.",
        ]
        .iter()
        .enumerate()
        {
            let mut chunk = hit("onboarding.pdf", i as u32, text, 0.0).chunk;
            chunk.embedding = HashEmbedder.embed(text).await.unwrap();
            chunks.push(chunk);
        }
        index.insert_chunks(&chunks).await.unwrap();

        let llm = Arc::new(llm);
        let state = AppState::from_parts(
            config,
            llm.clone(),
            Arc::new(HashEmbedder),
            index,
            ConversationStore::in_memory().unwrap(),
            Reranker::new(Arc::new(LexicalScorer::default()), 3),
        )
        .unwrap();
        (build_router(state), llm)
    }

    async fn app() -> (Router, Arc<ScriptedLlm>) {
        app_with(ScriptedLlm::fixed(ANSWER)).await
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = send(app, method, uri, body).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_healthy() {
        let (app, _) = app().await;
        let (status, body) = send_json(&app, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        for service in ["database", "llm", "embeddings", "vector_index", "tracing"] {
            assert_eq!(body["services"][service], "healthy", "{}", service);
        }
    }

    #[tokio::test]
    async fn test_health_degraded() {
        let (app, _) = app_with(ScriptedLlm::failing()).await;
        let (status, body) = send_json(&app, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert!(body["services"]["llm"].as_str().unwrap().starts_with("unhealthy"));
    }

    #[tokio::test]
    async fn test_chat_creates_and_continues_conversation() {
        let (app, llm) = app().await;

        let (status, first) = send_json(
            &app,
            "POST",
            "/api/v1/chat",
            Some(json!({"message": "Where do I get a badge?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["response"], ANSWER);
        assert_eq!(first["citations"].as_array().unwrap().len(), 1);
        assert_eq!(first["citations"][0]["document_name"], "onboarding.pdf");
        assert_eq!(first["metadata"]["citations_count"], 1);
        let id = first["conversation_id"].as_str().unwrap().to_string();

        let (status, _) = send_json(
            &app,
            "POST",
            "/api/v1/chat",
            Some(json!({"message": "And when does the office close?", "conversation_id": id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        {
            let prompts = llm.prompts.lock();
            let last = prompts.last().unwrap();
            assert!(last.contains("Previous conversation:\nUser: Where do I get a badge?"));
            assert!(!last.contains("User: And when does the office close?"));
        }

        let (status, history) =
            send_json(&app, "GET", &format!("/api/v1/conversations/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let messages = history["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert!(messages[1]["metadata"]["citations"].is_array());
    }

    #[tokio::test]
    async fn test_chat_validation() {
        let (app, llm) = app().await;

        let (status, body) =
            send_json(&app, "POST", "/api/v1/chat", Some(json!({"message": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request");

        let (status, _) = send_json(
            &app,
            "POST",
            "/api/v1/chat",
            Some(json!({"message": "hi", "conversation_id": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(llm.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_stream() {
        let (app, _) = app().await;
        let (status, bytes) = send(
            &app,
            "POST",
            "/api/v1/chat",
            Some(json!({"message": "badge?", "stream": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body = String::from_utf8(bytes).unwrap();
        assert!(body.contains(r#"data: {"content":"Badges "}"#));
        assert!(body.contains("\"citations\""));
        assert!(body.trim_end().ends_with("data: [DONE]"));
    }

    #[tokio::test]
    async fn test_conversations() {
        let (app, _) = app().await;
        let (status, created) =
            send_json(&app, "POST", "/api/v1/conversations", Some(json!({"user_id": "u1"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["message_count"], 0);

        let (status, created) = send_json(&app, "POST", "/api/v1/conversations", None).await;
        assert_eq!(status, StatusCode::OK);
        let id = created["conversation_id"].as_str().unwrap();
        let (status, history) =
            send_json(&app, "GET", &format!("/api/v1/conversations/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(history["messages"].as_array().unwrap().is_empty());

        let (status, body) = send_json(&app, "GET", "/api/v1/conversations/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "not_found");
    }

    #[tokio::test]
    async fn test_ingest_document() {
        let (app, _) = app().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parking.md");
        std::fs::write(&path, "# Parking\n\nVisitors park in lot B.").unwrap();

        let (status, body) = send_json(
            &app,
            "POST",
            "/api/v1/documents/ingest",
            Some(json!({"file_path": path.to_string_lossy(), "metadata": {"site": "hq"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["chunks_created"].as_u64().unwrap() >= 1);
        assert!(body["document_id"].is_string());

        let (status, body) = send_json(
            &app,
            "POST",
            "/api/v1/documents/ingest",
            Some(json!({"file_path": "/does/not/exist.txt"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["chunks_created"], 0);
        assert!(body["message"].as_str().unwrap().starts_with("Error ingesting document"));
    }

    #[tokio::test]
    async fn test_openai_completion() {
        let (app, llm) = app().await;
        let (status, body) = send_json(
            &app,
            "POST",
            "/api/v1/v1/chat/completions",
            Some(json!({
                "model": "rag",
                "messages": [
                    {"role": "system", "content": "be nice"},
                    {"role": "user", "content": "hello there"},
                    {"role": "assistant", "content": "hi"},
                    {"role": "user", "content": "where are badges issued"}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["object"], "chat.completion");
        assert_eq!(body["model"], "rag");
        assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));
        assert_eq!(body["choices"][0]["message"]["content"], ANSWER);
        assert_eq!(body["choices"][0]["finish_reason"], "stop");
        assert_eq!(body["usage"]["prompt_tokens"], 4);
        assert_eq!(body["usage"]["completion_tokens"], ANSWER.split_whitespace().count());

        let prompts = llm.prompts.lock();
        let answer_prompt = prompts.last().unwrap();
        assert!(answer_prompt.contains("User: hello there\nAssistant: hi"));
        assert!(!answer_prompt.contains("be nice"));
    }

    #[tokio::test]
    async fn test_openai_sampling_defaults_from_config() {
        let mut config = RagConfig::default();
        config.llm.temperature = 0.2;
        config.llm.max_tokens = 512;
        let (app, llm) = app_with_config(ScriptedLlm::fixed(ANSWER), config).await;

        let messages = json!([{"role": "user", "content": "where are badges issued"}]);
        let (status, _) = send_json(
            &app,
            "POST",
            "/api/v1/v1/chat/completions",
            Some(json!({ "messages": messages })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let used = *llm.options.lock().last().unwrap();
        assert_eq!(used.max_tokens, 512);
        assert!((used.temperature - 0.2).abs() < f32::EPSILON);

        let (status, _) = send_json(
            &app,
            "POST",
            "/api/v1/v1/chat/completions",
            Some(json!({ "messages": messages, "temperature": 0.9 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let used = *llm.options.lock().last().unwrap();
        assert_eq!(used.max_tokens, 512);
        assert!((used.temperature - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_openai_requires_user_message() {
        let (app, _) = app().await;
        let (status, _) = send_json(
            &app,
            "POST",
            "/api/v1/v1/chat/completions",
            Some(json!({"messages": [{"role": "system", "content": "x"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_openai_stream() {
        let (app, _) = app().await;
        let (status, bytes) = send(
            &app,
            "POST",
            "/api/v1/v1/chat/completions",
            Some(json!({"stream": true, "messages": [{"role": "user", "content": "badges?"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let body = String::from_utf8(bytes).unwrap();
        let events: Vec<&str> = body
            .lines()
            .filter_map(|l| l.strip_prefix("data: "))
            .collect();
        assert_eq!(events.len(), ANSWER.split_whitespace().count() + 2);
        assert_eq!(*events.last().unwrap(), "[DONE]");

        let first: Value = serde_json::from_str(events[0]).unwrap();
        assert_eq!(first["object"], "chat.completion.chunk");
        assert_eq!(first["choices"][0]["delta"]["content"], "Badges ");
        assert!(first["choices"][0]["finish_reason"].is_null());

        let last: Value = serde_json::from_str(events[events.len() - 2]).unwrap();
        assert_eq!(last["choices"][0]["finish_reason"], "stop");
        assert_eq!(last["choices"][0]["delta"], json!({}));
    }

    #[tokio::test]
    async fn test_models_and_prefix() {
        let (app, _) = app().await;
        let (status, body) = send_json(&app, "GET", "/api/v1/v1/models", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["object"], "list");
        assert_eq!(body["data"][0]["id"], RagConfig::default().llm.model);

        let (status, _) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
