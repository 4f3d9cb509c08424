use std::time::Duration;

use axum::extract::ws::Message;
use chrono::Utc;
use liveclass_messaging::models::{MessageDto, MessageType, UserProfile, UserRole};
use liveclass_messaging::realtime::channel::USER_STATUS;
use liveclass_messaging::realtime::{Channel, ChannelAuthorizer, ChannelRegistry, PresenceTracker, RealtimeEvent};
use uuid::Uuid;

fn sample_message(conversation_id: Uuid) -> MessageDto {
    MessageDto {
        id: Uuid::new_v4(),
        conversation_id,
        sender: UserProfile {
            id: Uuid::new_v4(),
            email: "sender@school.test".into(),
            role: UserRole::Student,
        },
        content: Some("see you in class".into()),
        message_type: MessageType::Text,
        file_url: None,
        file_name: None,
        file_size: None,
        parent_id: None,
        created_at: Utc::now(),
        reactions: vec![],
        read_receipts: vec![],
    }
}

#[test]
fn new_message_frame_is_camel_case_and_channel_tagged() {
    let conversation_id = Uuid::new_v4();
    let message = sample_message(conversation_id);
    let frame = RealtimeEvent::NewMessage(message.clone())
        .to_frame(&Channel::Conversation(conversation_id))
        .unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(parsed["event"], "new-message");
    assert_eq!(parsed["channel"], format!("conversation-{conversation_id}"));
    assert_eq!(parsed["data"]["id"], message.id.to_string());
    assert_eq!(parsed["data"]["type"], "TEXT");
    assert_eq!(
        parsed["data"]["conversationId"],
        conversation_id.to_string()
    );
    assert_eq!(parsed["data"]["sender"]["email"], "sender@school.test");
    // No snake_case leaks across the wire boundary.
    assert!(parsed["data"].get("conversation_id").is_none());
}

#[tokio::test]
async fn broadcast_frame_drives_presence_view() {
    let registry = ChannelRegistry::new();
    let tracker = PresenceTracker::start(&registry).await;
    let user = Uuid::new_v4();

    // A subscriber on the same channel sees exactly what the tracker sees.
    let mut rx = registry.subscribe(USER_STATUS).await;

    let frame = RealtimeEvent::online(user)
        .to_frame(&Channel::UserStatus)
        .unwrap();
    registry
        .broadcast(USER_STATUS, Message::Text(frame.clone()))
        .await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(rx.recv().await, Some(Message::Text(frame)));
    assert!(tracker.is_online(user).await);

    let offline = RealtimeEvent::offline(user)
        .to_frame(&Channel::UserStatus)
        .unwrap();
    registry.broadcast(USER_STATUS, Message::Text(offline)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!tracker.is_online(user).await);
}

#[tokio::test]
async fn conversation_broadcast_does_not_cross_channels() {
    let registry = ChannelRegistry::new();
    let a = Channel::Conversation(Uuid::new_v4());
    let b = Channel::Conversation(Uuid::new_v4());
    let mut rx_a = registry.subscribe(&a.name()).await;
    let mut rx_b = registry.subscribe(&b.name()).await;

    registry
        .broadcast(&a.name(), Message::Text("for a".into()))
        .await;

    assert_eq!(rx_a.recv().await, Some(Message::Text("for a".into())));
    assert!(rx_b.try_recv().is_err());
}

#[test]
fn channel_auth_token_is_scoped_to_one_socket() {
    let authorizer = ChannelAuthorizer::new("key".into(), "secret".into());
    let channel = format!("private-conversation-{}", Uuid::new_v4());

    let token = authorizer.authorize("81234.1234", &channel);
    assert!(token.starts_with("key:"));
    // A second socket asking for the same channel gets its own signature.
    assert_ne!(token, authorizer.authorize("81234.9999", &channel));
    assert_eq!(token, authorizer.authorize("81234.1234", &channel));
}
