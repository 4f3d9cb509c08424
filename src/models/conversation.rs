use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::message::MessageDto;
use crate::models::user::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationType {
    Direct,
    Group,
    Cohort,
    Class,
}

impl ConversationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Direct => "DIRECT",
            ConversationType::Group => "GROUP",
            ConversationType::Cohort => "COHORT",
            ConversationType::Class => "CLASS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DIRECT" => Some(ConversationType::Direct),
            "GROUP" => Some(ConversationType::Group),
            "COHORT" => Some(ConversationType::Cohort),
            "CLASS" => Some(ConversationType::Class),
            _ => None,
        }
    }

    pub fn from_str(value: &str) -> Self {
        Self::parse(value).unwrap_or(ConversationType::Group)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantRole {
    Admin,
    Member,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Admin => "ADMIN",
            ParticipantRole::Member => "MEMBER",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "ADMIN" => ParticipantRole::Admin,
            _ => ParticipantRole::Member,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, ParticipantRole::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    pub user: UserProfile,
    pub role: ParticipantRole,
    pub last_read_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
}

/// Conversation as delivered to clients: participants, the most recent
/// message, and the caller-specific unread count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    pub name: Option<String>,
    pub cohort_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub created_by: Uuid,
    pub is_archived: bool,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub participants: Vec<ParticipantDto>,
    pub last_message: Option<MessageDto>,
    pub unread_count: i64,
}
