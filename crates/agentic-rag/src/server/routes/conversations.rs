//! Conversation endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::api::{ConversationHistoryResponse, ConversationResponse, CreateConversationRequest};

/// POST /conversations - Start an empty conversation
pub async fn create_conversation(
    State(state): State<AppState>,
    request: Option<Json<CreateConversationRequest>>,
) -> Result<Json<ConversationResponse>> {
    if let Some(user_id) = request.and_then(|Json(r)| r.user_id) {
        tracing::debug!("Creating conversation for user {}", user_id);
    }

    let conversation = state.conversations().create_conversation().await?;
    Ok(Json(ConversationResponse {
        conversation_id: conversation.conversation_id,
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
        message_count: 0,
    }))
}

/// GET /conversations/:id - Full message history
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationHistoryResponse>> {
    let history = state
        .conversations()
        .get_conversation_history(&conversation_id, None)
        .await?
        .ok_or_else(|| Error::ConversationNotFound(conversation_id.clone()))?;

    Ok(Json(ConversationHistoryResponse {
        conversation_id: history.conversation_id,
        messages: history.messages,
        created_at: history.created_at,
        updated_at: history.updated_at,
    }))
}
