use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
    Form, Json,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{resolve_session, Identity};
use crate::middleware::guards::{CurrentUser, Participant};
use crate::realtime::auth::is_subscribable;
use crate::realtime::fanout::publish_best_effort;
use crate::realtime::{Channel, RealtimeEvent};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub socket_id: Option<String>,
    pub channel_name: Option<String>,
}

/// POST /realtime/auth
///
/// Channel authorization handshake: the client presents its socket id and
/// the channel it wants; the server checks it may read that channel and
/// signs the pair. Only `private-`/`presence-` names are subscribable.
pub async fn authorize_channel(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(body): Form<AuthRequest>,
) -> AppResult<Json<Value>> {
    let socket_id = body
        .socket_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("socket_id is required".into()))?;
    let channel_name = body
        .channel_name
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("channel_name is required".into()))?;

    if !is_subscribable(&channel_name) {
        return Err(AppError::Validation(
            "channel is not subscribable".into(),
        ));
    }
    let channel = Channel::parse(&channel_name)
        .ok_or_else(|| AppError::Validation("unknown channel".into()))?;

    if let Channel::Conversation(conversation_id) = channel {
        Participant::verify(&state.db, user.id, conversation_id).await?;
    }

    let auth = state.authorizer.authorize(&socket_id, &channel_name);

    let mut response = json!({ "auth": auth });
    if channel_name.starts_with("presence-") {
        let email: String = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
            .bind(user.id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let channel_data = json!({
            "user_id": user.id,
            "user_info": { "email": email, "role": user.role },
        });
        response["channel_data"] = Value::String(channel_data.to_string());
    }

    Ok(Json(response))
}

/// GET /realtime/presence
pub async fn online_users(State(state): State<AppState>) -> Json<Value> {
    let users = state.presence.online_users().await;
    Json(json!({ "users": users }))
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
    pub channel: Option<String>,
}

/// GET /realtime/ws?token=...&channel=conversation-{id}
///
/// Authenticates before upgrading; a socket is bound to exactly one
/// channel for its lifetime.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let token = params.token.ok_or(AppError::Unauthorized)?;
    let identity = resolve_session(&state.config.session_secret, &token)?;

    let name = params
        .channel
        .ok_or_else(|| AppError::Validation("channel is required".into()))?;
    let channel =
        Channel::parse(&name).ok_or_else(|| AppError::Validation("unknown channel".into()))?;

    if let Channel::Conversation(conversation_id) = channel {
        Participant::verify(&state.db, identity.user_id, conversation_id).await?;
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(state, socket, identity, channel)))
}

async fn handle_socket(state: AppState, socket: WebSocket, identity: Identity, channel: Channel) {
    let user_id = identity.user_id;
    let mut rx = state.registry.subscribe(&channel.name()).await;
    let (mut sink, mut stream) = socket.split();

    tracing::debug!(%user_id, channel = %channel.name(), "socket connected");
    publish_best_effort(
        &state.fanout,
        &Channel::UserStatus,
        &RealtimeEvent::online(user_id),
    )
    .await;

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&state, user_id, &channel, &text).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    tracing::debug!(%user_id, channel = %channel.name(), "socket disconnected");
    publish_best_effort(
        &state.fanout,
        &Channel::UserStatus,
        &RealtimeEvent::offline(user_id),
    )
    .await;
}

#[derive(Debug, Deserialize)]
struct ClientFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// The only client-to-server frame is typing state; everything else a
/// client could want goes through the HTTP API.
async fn handle_client_frame(state: &AppState, user_id: Uuid, channel: &Channel, text: &str) {
    let Ok(frame) = serde_json::from_str::<ClientFrame>(text) else {
        return;
    };
    if frame.event != "user-typing" {
        return;
    }
    let Channel::Conversation(_) = channel else {
        return;
    };

    let is_typing = frame
        .data
        .get("isTyping")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    publish_best_effort(
        &state.fanout,
        channel,
        &RealtimeEvent::UserTyping { user_id, is_typing },
    )
    .await;
}
