use axum::extract::ws::Message;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::realtime::channel::USER_STATUS;
use crate::realtime::events::RealtimeEvent;
use crate::realtime::registry::ChannelRegistry;

/// Derived view of who is currently online, fed by the `user-status`
/// channel. Purely cached state; the store stays authoritative for
/// everything that matters.
pub struct PresenceTracker {
    online: Arc<RwLock<HashSet<Uuid>>>,
    task: JoinHandle<()>,
}

impl PresenceTracker {
    pub async fn start(registry: &ChannelRegistry) -> Self {
        let online: Arc<RwLock<HashSet<Uuid>>> = Arc::default();
        let mut rx = registry.subscribe(USER_STATUS).await;

        let task = {
            let online = Arc::clone(&online);
            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    let Message::Text(text) = msg else { continue };
                    match serde_json::from_str::<RealtimeEvent>(&text) {
                        Ok(RealtimeEvent::UserOnline { user_id, .. }) => {
                            online.write().await.insert(user_id);
                        }
                        Ok(RealtimeEvent::UserOffline { user_id, .. }) => {
                            online.write().await.remove(&user_id);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::debug!(error = %e, "ignoring unparseable presence frame");
                        }
                    }
                }
            })
        };

        Self { online, task }
    }

    pub async fn online_users(&self) -> Vec<Uuid> {
        self.online.read().await.iter().copied().collect()
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.online.read().await.contains(&user_id)
    }

    /// Release the channel subscription. The receiver is dropped with the
    /// task, which lets the registry prune the sender.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::channel::Channel;
    use std::time::Duration;

    async fn emit(registry: &ChannelRegistry, event: RealtimeEvent) {
        let frame = event.to_frame(&Channel::UserStatus).unwrap();
        registry.broadcast(USER_STATUS, Message::Text(frame)).await;
        // Give the tracker task a beat to drain the channel.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn tracks_online_and_offline() {
        let registry = ChannelRegistry::new();
        let tracker = PresenceTracker::start(&registry).await;
        let user = Uuid::new_v4();

        emit(&registry, RealtimeEvent::online(user)).await;
        assert!(tracker.is_online(user).await);

        emit(&registry, RealtimeEvent::offline(user)).await;
        assert!(!tracker.is_online(user).await);
    }

    #[tokio::test]
    async fn ignores_unrelated_events_and_noise() {
        let registry = ChannelRegistry::new();
        let tracker = PresenceTracker::start(&registry).await;
        let user = Uuid::new_v4();

        emit(&registry, RealtimeEvent::online(user)).await;
        emit(
            &registry,
            RealtimeEvent::MessageDeleted {
                message_id: Uuid::new_v4(),
            },
        )
        .await;
        registry
            .broadcast(USER_STATUS, Message::Text("not json".into()))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(tracker.online_users().await, vec![user]);
    }

    #[tokio::test]
    async fn shutdown_releases_subscription() {
        let registry = ChannelRegistry::new();
        let tracker = PresenceTracker::start(&registry).await;
        assert_eq!(registry.subscriber_count(USER_STATUS).await, 1);

        tracker.shutdown();
        tokio::time::sleep(Duration::from_millis(20)).await;
        registry
            .broadcast(USER_STATUS, Message::Text("ping".into()))
            .await;
        assert_eq!(registry.subscriber_count(USER_STATUS).await, 0);
    }
}
