//! Native chat endpoint

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

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::api::{ChatRequest, ChatResponse};
use crate::types::{Role, Turn};

/// POST /chat - Answer a message inside a conversation
///
/// Creates a conversation when none is given. Prior messages are passed to
/// the pipeline as history; both sides of the exchange are stored.
pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Result<Response> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(Error::invalid_request("message must not be empty"));
    }

    let store = state.conversations();
    let conversation_id = match request.conversation_id {
        Some(id) => {
            if store.get_conversation(&id).await?.is_none() {
                return Err(Error::ConversationNotFound(id));
            }
            id
        }
        None => store.create_conversation().await?.conversation_id,
    };

    let history: Vec<Turn> = store
        .get_recent_messages(&conversation_id, state.config().conversation.history_limit)
        .await?
        .iter()
        .map(Turn::from)
        .collect();
    store
        .add_message(&conversation_id, Role::User, message, None)
        .await?;

    let result = state.orchestrator().process_query(message, &history).await?;

    store.add_message(
        &conversation_id,
        Role::Assistant,
        &result.response,
        Some(json!({ "citations": result.citations })),
    )
    .await?;

    let response = ChatResponse {
        response: result.response,
        conversation_id,
        citations: result.citations,
        metadata: result.metadata,
    };

    if request.stream {
        Ok(stream_chat(response).into_response())
    } else {
        Ok(Json(response).into_response())
    }
}

/// Deliver a finished answer as word fragments, then citations, then `[DONE]`
fn stream_chat(response: ChatResponse) -> Sse<impl futures::Stream<Item = std::result::Result<Event, Infallible>>> {
    let mut events: Vec<Event> = fragments(&response.response)
        .into_iter()
        .map(|content| Event::default().data(json!({ "content": content }).to_string()))
        .collect();

    events.push(
        Event::default().data(
            json!({
                "conversation_id": response.conversation_id,
                "citations": response.citations,
                "metadata": response.metadata,
            })
            .to_string(),
        ),
    );
    events.push(Event::default().data("[DONE]"));

    Sse::new(stream::iter(events.into_iter().map(Ok)))
}

/// Whitespace-split answer pieces, each followed by a space
pub(crate) fn fragments(text: &str) -> Vec<String> {
    text.split_whitespace().map(|w| format!("{} ", w)).collect()
}
