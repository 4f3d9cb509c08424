use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::guards::CurrentUser;
use crate::realtime::fanout::publish_best_effort;
use crate::realtime::{Channel, RealtimeEvent};
use crate::services::message_service::ReactionToggle;
use crate::services::MessageService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReactRequest {
    pub emoji: String,
}

/// POST /messages/{id}/react
///
/// Toggle semantics: reacting with an emoji the caller already used
/// removes it. The broadcast carries the message's full reaction list so
/// clients replace rather than patch.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(message_id): Path<Uuid>,
    Json(body): Json<ReactRequest>,
) -> AppResult<Json<Value>> {
    let (conversation_id, toggle) =
        MessageService::toggle_reaction(&state.db, message_id, user.id, &body.emoji).await?;

    let reactions = MessageService::reactions_for_message(&state.db, message_id).await?;
    publish_best_effort(
        &state.fanout,
        &Channel::Conversation(conversation_id),
        &RealtimeEvent::MessageReaction {
            message_id,
            reactions,
        },
    )
    .await;

    let response = match toggle {
        ReactionToggle::Added(reaction) => json!({ "action": "added", "reaction": reaction }),
        ReactionToggle::Removed => json!({ "action": "removed" }),
    };
    Ok(Json(response))
}
