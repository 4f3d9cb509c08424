//! Authorization guards that enforce permission checks at the type level
//! so handlers cannot accidentally skip them.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::Identity;
use crate::models::ParticipantRole;

/// The authenticated caller, extracted from the identity placed in request
/// extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: crate::models::UserRole,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AppError::Unauthorized)?;

        Ok(CurrentUser {
            id: identity.user_id,
            role: identity.role,
        })
    }
}

/// A verified conversation participant. Constructing one is the only way
/// to prove membership, and it costs exactly one query.
#[derive(Debug, Clone)]
pub struct Participant {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub role: ParticipantRole,
    pub last_read_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct ParticipantRecord {
    conversation_id: Uuid,
    user_id: Uuid,
    role: String,
    last_read_at: Option<DateTime<Utc>>,
}

impl Participant {
    /// Fails with 403 whether the conversation is missing or the caller is
    /// simply not in it, so non-participants cannot probe for existence.
    pub async fn verify(
        db: &PgPool,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Self, AppError> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            "SELECT conversation_id, user_id, role, last_read_at \
             FROM conversation_participants \
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::Forbidden)?;

        Ok(Participant {
            conversation_id: record.conversation_id,
            user_id: record.user_id,
            role: ParticipantRole::from_str(&record.role),
            last_read_at: record.last_read_at,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_role_is_admin() {
        let p = Participant {
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role: ParticipantRole::Admin,
            last_read_at: None,
        };
        assert!(p.is_admin());
    }

    #[test]
    fn member_role_is_not_admin() {
        let p = Participant {
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role: ParticipantRole::Member,
            last_read_at: None,
        };
        assert!(!p.is_admin());
    }

    #[test]
    fn unknown_role_string_falls_back_to_member() {
        assert_eq!(ParticipantRole::from_str("OWNER"), ParticipantRole::Member);
    }
}
