use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::guards::{CurrentUser, Participant};
use crate::models::MessageDto;
use crate::realtime::fanout::publish_best_effort;
use crate::realtime::{Channel, RealtimeEvent};
use crate::services::message_service::NewMessage;
use crate::services::MessageService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub cursor: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    pub messages: Vec<MessageDto>,
    pub next_cursor: Option<Uuid>,
}

/// GET /conversations/{id}
///
/// One page of messages, newest first. Fetching a page also advances the
/// caller's read watermark for the conversation.
pub async fn get_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<MessagesResponse>> {
    let participant = Participant::verify(&state.db, user.id, conversation_id).await?;
    let page = MessageService::fetch_page(&state.db, &participant, query.cursor).await?;

    Ok(Json(MessagesResponse {
        messages: page.messages,
        next_cursor: page.next_cursor,
    }))
}

/// POST /conversations/{id}
///
/// The message is committed before any publish happens; a broker outage
/// degrades liveness, never durability.
pub async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<NewMessage>,
) -> AppResult<(StatusCode, Json<MessageDto>)> {
    let participant = Participant::verify(&state.db, user.id, conversation_id).await?;
    let message = MessageService::send_message(&state.db, &participant, body).await?;

    publish_best_effort(
        &state.fanout,
        &Channel::Conversation(conversation_id),
        &RealtimeEvent::NewMessage(message.clone()),
    )
    .await;

    Ok((StatusCode::CREATED, Json(message)))
}
