//! OpenAI-compatible chat completions for chat front-ends

use axum::{
    extract::State,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream;
use serde_json::json;
use std::convert::Infallible;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::providers::GenerationOptions;
use crate::server::state::AppState;
use crate::types::openai::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, Delta,
    ModelInfo, ModelList, Usage,
};
use crate::types::Role;

use super::chat::fragments;

/// POST /v1/chat/completions
///
/// The last `user` message is the query and earlier turns are history. Each
/// exchange is persisted in a fresh conversation.
pub async fn chat_completions(
    State(state): State<AppState>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response> {
    let index = request
        .last_user_index()
        .ok_or_else(|| Error::invalid_request("No user message found"))?;
    let query = request.messages[index].content.trim().to_string();
    if query.is_empty() {
        return Err(Error::invalid_request("No user message found"));
    }
    let history = request.history_before(index);

    let store = state.conversations();
    let conversation = store.create_conversation().await?;
    store
        .add_message(&conversation.conversation_id, Role::User, &query, None)
        .await?;

    let defaults = state.orchestrator().default_options();
    let options = GenerationOptions {
        temperature: request.temperature.unwrap_or(defaults.temperature),
        max_tokens: request.max_tokens.unwrap_or(defaults.max_tokens),
    };
    let result = state
        .orchestrator()
        .process_query_with(&query, &history, options)
        .await?;

    store.add_message(
        &conversation.conversation_id,
        Role::Assistant,
        &result.response,
        Some(json!({ "citations": result.citations })),
    )
    .await?;

    let id = completion_id();
    let created = chrono::Utc::now().timestamp();

    if request.stream {
        return Ok(stream_completion(&id, created, &request.model, &result.response).into_response());
    }

    Ok(Json(ChatCompletionResponse {
        id,
        object: "chat.completion".to_string(),
        created,
        model: request.model,
        choices: vec![Choice {
            index: 0,
            message: ChatMessage {
                role: Role::Assistant.as_str().to_string(),
                content: result.response.clone(),
            },
            finish_reason: "stop".to_string(),
        }],
        usage: Usage::from_text(&query, &result.response),
    })
    .into_response())
}

fn stream_completion(
    id: &str,
    created: i64,
    model: &str,
    answer: &str,
) -> Sse<impl futures::Stream<Item = std::result::Result<Event, Infallible>>> {
    let mut chunks: Vec<ChatCompletionChunk> = fragments(answer)
        .into_iter()
        .map(|content| {
            let delta = Delta {
                role: None,
                content: Some(content),
            };
            ChatCompletionChunk::new(id, created, model, delta, None)
        })
        .collect();
    chunks.push(ChatCompletionChunk::new(id, created, model, Delta::default(), Some("stop")));

    let mut events: Vec<Event> = chunks
        .iter()
        .map(|chunk| Event::default().data(serde_json::to_string(chunk).unwrap_or_default()))
        .collect();
    events.push(Event::default().data("[DONE]"));

    Sse::new(stream::iter(events.into_iter().map(Ok)))
}

/// GET /v1/models - Advertise the configured model
pub async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    Json(ModelList {
        object: "list".to_string(),
        data: vec![ModelInfo {
            id: state.config().llm.model.clone(),
            object: "model".to_string(),
            created: chrono::Utc::now().timestamp(),
            owned_by: "agentic-rag".to_string(),
        }],
    })
}

fn completion_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("chatcmpl-{}", &hex[..8])
}
