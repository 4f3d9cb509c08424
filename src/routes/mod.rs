use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

pub mod conversations;
pub mod messages;
pub mod reactions;
pub mod realtime;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Introspection stays public for healthchecks and scrapers.
    let introspection = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(crate::metrics::metrics_handler));

    let api = Router::new()
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/conversations/:id",
            get(messages::get_messages).post(messages::send_message),
        )
        .route("/messages/:id/react", post(reactions::toggle_reaction))
        .route("/realtime/auth", post(realtime::authorize_channel))
        .route("/realtime/presence", get(realtime::online_users))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    // The socket endpoint authenticates in-band (token query parameter)
    // because browser WebSocket clients cannot set headers.
    let router = introspection
        .merge(api)
        .route("/realtime/ws", get(realtime::ws_handler))
        .layer(middleware::from_fn(crate::metrics::track_http_metrics))
        .layer(CorsLayer::permissive());

    crate::middleware::logging::add_tracing(router).with_state(state)
}
