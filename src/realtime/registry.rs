use axum::extract::ws::Message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};

/// In-process subscriber registry, keyed by channel name. Subscription
/// lifetime is owned by the subscriber: dropping the receiver makes the
/// sender fail on the next broadcast, at which point it is pruned.
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    inner: Arc<RwLock<HashMap<String, Vec<UnboundedSender<Message>>>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, channel: &str) -> UnboundedReceiver<Message> {
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;
        guard.entry(channel.to_string()).or_default().push(tx);
        rx
    }

    /// At-most-once per currently-connected subscriber, no replay.
    pub async fn broadcast(&self, channel: &str, msg: Message) {
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(channel) {
            list.retain(|sender| sender.send(msg.clone()).is_ok());
            if list.is_empty() {
                guard.remove(channel);
            }
        }
    }

    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let guard = self.inner.read().await;
        guard.get(channel).map(|l| l.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let registry = ChannelRegistry::new();
        let mut a = registry.subscribe("conversation-x").await;
        let mut b = registry.subscribe("conversation-x").await;

        registry
            .broadcast("conversation-x", Message::Text("hello".into()))
            .await;

        assert_eq!(a.recv().await, Some(Message::Text("hello".into())));
        assert_eq!(b.recv().await, Some(Message::Text("hello".into())));
    }

    #[tokio::test]
    async fn broadcast_is_scoped_to_channel() {
        let registry = ChannelRegistry::new();
        let mut a = registry.subscribe("conversation-a").await;
        let _b = registry.subscribe("conversation-b").await;

        registry
            .broadcast("conversation-b", Message::Text("b only".into()))
            .await;

        assert!(a.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let registry = ChannelRegistry::new();
        let rx = registry.subscribe("user-status").await;
        assert_eq!(registry.subscriber_count("user-status").await, 1);

        drop(rx);
        registry
            .broadcast("user-status", Message::Text("ping".into()))
            .await;

        assert_eq!(registry.subscriber_count("user-status").await, 0);
    }
}
