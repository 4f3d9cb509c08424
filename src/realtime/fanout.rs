use axum::extract::ws::Message;
use futures_util::StreamExt;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use thiserror::Error;

use crate::realtime::channel::{Channel, USER_STATUS};
use crate::realtime::events::RealtimeEvent;
use crate::realtime::registry::ChannelRegistry;

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to publish to redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
}

/// Publisher side of the fan-out layer. Explicitly constructed and passed
/// into the services that need it; owns its Redis client and a bounded
/// publish deadline so a slow broker can never hang a request.
pub struct FanoutClient {
    client: Client,
    publish_timeout: Duration,
}

impl FanoutClient {
    pub fn new(client: Client, publish_timeout: Duration) -> Self {
        Self {
            client,
            publish_timeout,
        }
    }

    pub async fn publish(&self, channel: &Channel, event: &RealtimeEvent) -> Result<(), FanoutError> {
        let payload = event.to_frame(channel)?;
        let name = channel.name();

        let attempt = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.publish::<_, _, ()>(name, payload).await?;
            Ok::<(), redis::RedisError>(())
        };

        match tokio::time::timeout(self.publish_timeout, attempt).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(FanoutError::Redis(e)),
            Err(_) => Err(FanoutError::Timeout(self.publish_timeout)),
        }
    }
}

/// Best-effort publish: persistence is the source of truth, delivery is a
/// convenience layer, so failures are logged and swallowed.
pub async fn publish_best_effort(fanout: &FanoutClient, channel: &Channel, event: &RealtimeEvent) {
    if let Err(e) = fanout.publish(channel, event).await {
        crate::metrics::REALTIME_PUBLISH_FAILURES.inc();
        tracing::warn!(
            error = %e,
            channel = %channel.name(),
            event = event.event_name(),
            "realtime publish failed; clients will reconcile on next fetch"
        );
    }
}

/// Subscriber side: a process-wide listener that forwards everything
/// published on the conversation and presence channels into the local
/// registry. Runs for the lifetime of the process.
pub async fn start_listener(client: Client, registry: ChannelRegistry) -> redis::RedisResult<()> {
    // PubSub requires a dedicated connection, not multiplexed
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.psubscribe("conversation-*").await?;
    pubsub.subscribe(USER_STATUS).await?;

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel: String = msg.get_channel_name().into();
        let payload: String = msg.get_payload()?;
        registry.broadcast(&channel, Message::Text(payload)).await;
    }
    Ok(())
}
