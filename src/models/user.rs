use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Student,
    Instructor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "STUDENT",
            UserRole::Instructor => "INSTRUCTOR",
            UserRole::Admin => "ADMIN",
        }
    }

    /// Strict parse, used at the session boundary where an unknown role
    /// means the token is not trustworthy.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "STUDENT" => Some(UserRole::Student),
            "INSTRUCTOR" => Some(UserRole::Instructor),
            "ADMIN" => Some(UserRole::Admin),
            _ => None,
        }
    }

    /// Lenient parse for store values (the column is CHECK-constrained).
    pub fn from_str(value: &str) -> Self {
        Self::parse(value).unwrap_or(UserRole::Student)
    }
}

/// Minimal profile projection attached to participants, senders, reactions
/// and read receipts. Never more than this crosses the messaging boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}
