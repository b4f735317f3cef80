//! Document ingestion endpoint

use axum::{extract::State, Json};
use std::path::Path;

use crate::server::state::AppState;
use crate::types::api::{IngestRequest, IngestResponse};

/// POST /documents/ingest - Ingest a file already on the server's disk
///
/// Failures are reported in the body with `success: false`.
pub async fn ingest_document(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Json<IngestResponse> {
    tracing::info!("Ingest request: {}", request.file_path);

    let result = state
        .ingest()
        .ingest_file(Path::new(&request.file_path), request.metadata)
        .await;

    Json(match result {
        Ok(outcome) => IngestResponse {
            success: true,
            message: format!("Successfully ingested document: {}", request.file_path),
            document_id: Some(outcome.document_id.to_string()),
            chunks_created: outcome.chunks_created,
        },
        Err(e) => {
            tracing::error!("Error ingesting {}: {}", request.file_path, e);
            IngestResponse {
                success: false,
                message: format!("Error ingesting document: {}", e),
                document_id: None,
                chunks_created: 0,
            }
        }
    })
}
