//! Dependency health endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::api::HealthResponse;

/// GET /health - Probe every backing service
///
/// Always answers 200; failing dependencies mark the service degraded.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (database, llm, embeddings, vector_index, tracing_status) = tokio::join!(
        state.conversations().check_connection(),
        state.llm().health_check(),
        state.embedder().health_check(),
        state.index().health_check(),
        state.tracer().health_check(),
    );

    let checks = vec![
        ("database", unit(database)),
        ("llm", reachable(llm, "model server not reachable")),
        ("embeddings", reachable(embeddings, "embedding model not reachable")),
        ("vector_index", reachable(vector_index, "index unavailable")),
        ("tracing", unit(tracing_status)),
    ];

    let response = HealthResponse::from_checks(checks);
    if response.services.values().any(|s| s != "healthy") {
        tracing::warn!("Health check degraded: {:?}", response.services);
    }
    Json(response)
}

fn reachable(result: Result<bool>, reason: &str) -> std::result::Result<(), String> {
    match result {
        Ok(true) => Ok(()),
        Ok(false) => Err(reason.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn unit(result: Result<()>) -> std::result::Result<(), String> {
    result.map_err(|e| e.to_string())
}
