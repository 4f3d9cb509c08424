use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::guards::CurrentUser;
use crate::models::{ConversationDto, ConversationType};
use crate::services::ConversationService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    conversation_type: Option<String>,
}

/// GET /conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<ConversationDto>>> {
    let type_filter = match query.conversation_type.as_deref() {
        None => None,
        Some(raw) => Some(
            ConversationType::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown conversation type: {raw}")))?,
        ),
    };

    let conversations = ConversationService::list_for_user(&state.db, user.id, type_filter).await?;
    Ok(Json(conversations))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    #[serde(rename = "type")]
    pub conversation_type: String,
    pub name: Option<String>,
    pub cohort_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    #[serde(default)]
    pub participant_ids: Vec<Uuid>,
}

/// POST /conversations
///
/// DIRECT requests are get-or-create: repeated creates for the same pair
/// return the same conversation.
pub async fn create_conversation(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<CreateConversationRequest>,
) -> AppResult<(StatusCode, Json<ConversationDto>)> {
    let conversation_type = ConversationType::parse(&body.conversation_type).ok_or_else(|| {
        AppError::Validation(format!(
            "unknown conversation type: {}",
            body.conversation_type
        ))
    })?;

    let conversation = match conversation_type {
        ConversationType::Direct => {
            let others: Vec<Uuid> = ConversationService::participant_set(user.id, &body.participant_ids)
                .into_iter()
                .skip(1)
                .collect();
            let other = match others.as_slice() {
                [other] => *other,
                _ => {
                    return Err(AppError::Validation(
                        "direct conversations take exactly one other participant".into(),
                    ))
                }
            };
            ConversationService::create_direct(&state.db, user.id, other).await?
        }
        _ => {
            ConversationService::create_group(
                &state.db,
                user.id,
                conversation_type,
                body.name,
                body.cohort_id,
                body.class_id,
                &body.participant_ids,
            )
            .await?
        }
    };

    Ok((StatusCode::CREATED, Json(conversation)))
}
