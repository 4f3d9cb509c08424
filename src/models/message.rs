use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    File,
    Image,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "TEXT",
            MessageType::File => "FILE",
            MessageType::Image => "IMAGE",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "FILE" => MessageType::File,
            "IMAGE" => MessageType::Image,
            _ => MessageType::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionDto {
    pub id: Uuid,
    pub emoji: String,
    pub user: UserProfile,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptDto {
    pub user: UserProfile,
    pub read_at: DateTime<Utc>,
}

/// Fully-populated message: sender projection plus reaction and receipt
/// side tables. This is also the `new-message` event payload, so clients
/// never need a follow-up fetch to render a pushed message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: UserProfile,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub reactions: Vec<ReactionDto>,
    pub read_receipts: Vec<ReadReceiptDto>,
}
