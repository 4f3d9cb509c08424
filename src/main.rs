use std::sync::Arc;
use std::time::Duration;

use liveclass_messaging::config::Config;
use liveclass_messaging::error::AppError;
use liveclass_messaging::realtime::{
    fanout, ChannelAuthorizer, ChannelRegistry, FanoutClient, PresenceTracker,
};
use liveclass_messaging::state::AppState;
use liveclass_messaging::{db, logging, migrations, routes};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();

    let config = Config::from_env()?;

    let pool = db::init_pool(&config.database_url)
        .await
        .map_err(|e| AppError::StartServer(format!("database connect: {e}")))?;
    migrations::run_all(&pool)
        .await
        .map_err(|e| AppError::StartServer(format!("migrations: {e}")))?;

    let redis_client = redis::Client::open(config.redis_url.as_str())
        .map_err(|e| AppError::StartServer(format!("redis client: {e}")))?;

    let registry = ChannelRegistry::new();
    {
        let client = redis_client.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = fanout::start_listener(client, registry).await {
                tracing::error!(error = %e, "fan-out listener stopped");
            }
        });
    }

    let fanout_client = Arc::new(FanoutClient::new(
        redis_client,
        Duration::from_millis(config.publish_timeout_ms),
    ));
    let presence = Arc::new(PresenceTracker::start(&registry).await);
    let authorizer = Arc::new(ChannelAuthorizer::new(
        config.realtime_key.clone(),
        config.realtime_secret.clone(),
    ));

    let port = config.port;
    let state = AppState {
        db: pool,
        registry,
        fanout: fanout_client,
        presence,
        authorizer,
        config: Arc::new(config),
    };

    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::StartServer(format!("bind {addr}: {e}")))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::StartServer(format!("serve: {e}")))?;

    Ok(())
}
