//! Closed set of events crossing the realtime boundary.
//!
//! Every event is an explicit variant with an explicit payload schema,
//! validated at the publish boundary; producers and consumers cannot
//! silently drift. Wire frames look like:
//!
//! ```json
//! {
//!     "event": "new-message",
//!     "channel": "conversation-<uuid>",
//!     "data": { ... }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MessageDto, ReactionDto};
use crate::realtime::channel::Channel;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum RealtimeEvent {
    /// New message persisted; payload is the fully-populated message so
    /// subscribers can render it without a follow-up fetch.
    #[serde(rename = "new-message")]
    NewMessage(MessageDto),

    #[serde(rename = "user-typing")]
    #[serde(rename_all = "camelCase")]
    UserTyping { user_id: Uuid, is_typing: bool },

    /// Reaction set for one message changed; carries the full current list.
    #[serde(rename = "message-reaction")]
    #[serde(rename_all = "camelCase")]
    MessageReaction {
        message_id: Uuid,
        reactions: Vec<ReactionDto>,
    },

    #[serde(rename = "message-deleted")]
    #[serde(rename_all = "camelCase")]
    MessageDeleted { message_id: Uuid },

    #[serde(rename = "message-edited")]
    #[serde(rename_all = "camelCase")]
    MessageEdited { message_id: Uuid },

    #[serde(rename = "user-online")]
    #[serde(rename_all = "camelCase")]
    UserOnline {
        user_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "user-offline")]
    #[serde(rename_all = "camelCase")]
    UserOffline {
        user_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl RealtimeEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new-message",
            Self::UserTyping { .. } => "user-typing",
            Self::MessageReaction { .. } => "message-reaction",
            Self::MessageDeleted { .. } => "message-deleted",
            Self::MessageEdited { .. } => "message-edited",
            Self::UserOnline { .. } => "user-online",
            Self::UserOffline { .. } => "user-offline",
        }
    }

    pub fn online(user_id: Uuid) -> Self {
        Self::UserOnline {
            user_id,
            timestamp: Utc::now(),
        }
    }

    pub fn offline(user_id: Uuid) -> Self {
        Self::UserOffline {
            user_id,
            timestamp: Utc::now(),
        }
    }

    /// Serialize to the wire frame for a channel. This is the only place
    /// event serialization happens.
    pub fn to_frame(&self, channel: &Channel) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        value["channel"] = serde_json::Value::String(channel.name());
        serde_json::to_string(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_frame_shape() {
        let user_id = Uuid::new_v4();
        let conversation = Uuid::new_v4();
        let frame = RealtimeEvent::UserTyping {
            user_id,
            is_typing: true,
        }
        .to_frame(&Channel::Conversation(conversation))
        .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["event"], "user-typing");
        assert_eq!(parsed["channel"], format!("conversation-{conversation}"));
        assert_eq!(parsed["data"]["userId"], user_id.to_string());
        assert_eq!(parsed["data"]["isTyping"], true);
    }

    #[test]
    fn presence_frame_carries_timestamp() {
        let user_id = Uuid::new_v4();
        let frame = RealtimeEvent::online(user_id)
            .to_frame(&Channel::UserStatus)
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["event"], "user-online");
        assert_eq!(parsed["channel"], "user-status");
        assert_eq!(parsed["data"]["userId"], user_id.to_string());
        assert!(parsed["data"]["timestamp"].is_string());
    }

    #[test]
    fn event_names_are_stable() {
        assert_eq!(
            RealtimeEvent::MessageDeleted {
                message_id: Uuid::new_v4()
            }
            .event_name(),
            "message-deleted"
        );
        assert_eq!(
            RealtimeEvent::offline(Uuid::new_v4()).event_name(),
            "user-offline"
        );
    }

    #[test]
    fn frames_round_trip() {
        let event = RealtimeEvent::MessageReaction {
            message_id: Uuid::new_v4(),
            reactions: vec![],
        };
        let frame = event.to_frame(&Channel::UserStatus).unwrap();
        let back: RealtimeEvent = serde_json::from_str(&frame).unwrap();
        assert_eq!(back.event_name(), "message-reaction");
    }
}
