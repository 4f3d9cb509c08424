use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    ConversationDto, ConversationType, ParticipantDto, ParticipantRole, UserProfile, UserRole,
};
use crate::services::message_service::MessageService;

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    conversation_type: String,
    name: Option<String>,
    cohort_id: Option<Uuid>,
    class_id: Option<Uuid>,
    created_by: Uuid,
    is_archived: bool,
    last_message_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ParticipantRow {
    user_id: Uuid,
    email: String,
    user_role: String,
    role: String,
    last_read_at: Option<DateTime<Utc>>,
    joined_at: DateTime<Utc>,
}

const CONVERSATION_COLUMNS: &str = "c.id, c.conversation_type, c.name, c.cohort_id, c.class_id, \
     c.created_by, c.is_archived, c.last_message_at, c.created_at, c.updated_at";

pub struct ConversationService;

impl ConversationService {
    /// Canonical key for a DIRECT pair: the two ids sorted, joined with a
    /// colon. Both orderings of the same pair produce the same key, which
    /// the partial unique index turns into race-safe get-or-create.
    pub fn direct_key(a: Uuid, b: Uuid) -> String {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        format!("{lo}:{hi}")
    }

    /// Creator first, then the others with duplicates and the creator
    /// itself removed. Order is preserved so the creator stays the admin.
    pub fn participant_set(creator: Uuid, others: &[Uuid]) -> Vec<Uuid> {
        let mut all = vec![creator];
        for id in others {
            if !all.contains(id) {
                all.push(*id);
            }
        }
        all
    }

    /// Get-or-create the DIRECT conversation between `creator` and `other`.
    /// Concurrent calls for the same pair converge on one row: the insert
    /// is `ON CONFLICT DO NOTHING` against the partial unique index, and
    /// the loser re-selects the winner's row.
    pub async fn create_direct(
        db: &PgPool,
        creator: Uuid,
        other: Uuid,
    ) -> AppResult<ConversationDto> {
        if creator == other {
            return Err(AppError::Validation(
                "cannot start a direct conversation with yourself".into(),
            ));
        }

        let key = Self::direct_key(creator, other);
        let mut tx = db.begin().await?;

        let inserted: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO conversations (id, conversation_type, direct_key, created_by) \
             VALUES ($1, 'DIRECT', $2, $3) \
             ON CONFLICT (direct_key) WHERE conversation_type = 'DIRECT' DO NOTHING \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(&key)
        .bind(creator)
        .fetch_optional(&mut *tx)
        .await?;

        let conversation_id = match inserted {
            Some(id) => {
                Self::insert_participants(&mut tx, id, &[creator, other], creator).await?;
                id
            }
            None => sqlx::query_scalar(
                "SELECT id FROM conversations \
                 WHERE conversation_type = 'DIRECT' AND direct_key = $1",
            )
            .bind(&key)
            .fetch_one(&mut *tx)
            .await?,
        };

        tx.commit().await?;
        Self::load_dto(db, conversation_id, creator).await
    }

    /// Create a GROUP/COHORT/CLASS conversation with the creator as admin.
    pub async fn create_group(
        db: &PgPool,
        creator: Uuid,
        conversation_type: ConversationType,
        name: Option<String>,
        cohort_id: Option<Uuid>,
        class_id: Option<Uuid>,
        participant_ids: &[Uuid],
    ) -> AppResult<ConversationDto> {
        if conversation_type == ConversationType::Direct {
            return Err(AppError::Validation(
                "direct conversations take exactly one other participant".into(),
            ));
        }
        let name = match name.map(|n| n.trim().to_string()) {
            Some(n) if !n.is_empty() => Some(n),
            _ if conversation_type == ConversationType::Group => {
                return Err(AppError::Validation("group conversations require a name".into()))
            }
            other => other.filter(|n| !n.is_empty()),
        };

        let members = Self::participant_set(creator, participant_ids);
        if members.len() < 2 {
            return Err(AppError::Validation(
                "a conversation needs at least one other participant".into(),
            ));
        }

        let conversation_id = Uuid::new_v4();
        let mut tx = db.begin().await?;

        sqlx::query(
            "INSERT INTO conversations (id, conversation_type, name, cohort_id, class_id, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(conversation_id)
        .bind(conversation_type.as_str())
        .bind(&name)
        .bind(cohort_id)
        .bind(class_id)
        .bind(creator)
        .execute(&mut *tx)
        .await?;

        Self::insert_participants(&mut tx, conversation_id, &members, creator).await?;
        tx.commit().await?;

        Self::load_dto(db, conversation_id, creator).await
    }

    async fn insert_participants(
        tx: &mut Transaction<'_, Postgres>,
        conversation_id: Uuid,
        members: &[Uuid],
        creator: Uuid,
    ) -> AppResult<()> {
        for member in members {
            let role = if *member == creator {
                ParticipantRole::Admin
            } else {
                ParticipantRole::Member
            };
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id, role) \
                 VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(conversation_id)
            .bind(member)
            .bind(role.as_str())
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Every non-archived conversation the user participates in, most
    /// recent activity first, hydrated with participants, last message and
    /// unread count.
    pub async fn list_for_user(
        db: &PgPool,
        user_id: Uuid,
        type_filter: Option<ConversationType>,
    ) -> AppResult<Vec<ConversationDto>> {
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} \
             FROM conversations c \
             JOIN conversation_participants cp ON cp.conversation_id = c.id \
             WHERE cp.user_id = $1 \
               AND c.is_archived = FALSE \
               AND ($2::text IS NULL OR c.conversation_type = $2) \
             ORDER BY c.last_message_at DESC NULLS LAST, c.created_at DESC",
        ))
        .bind(user_id)
        .bind(type_filter.map(|t| t.as_str()))
        .fetch_all(db)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Self::hydrate(db, row, user_id).await?);
        }
        Ok(out)
    }

    /// Load one conversation for a caller whose membership has already been
    /// verified by a guard.
    pub async fn load_dto(
        db: &PgPool,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<ConversationDto> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = $1",
        ))
        .bind(conversation_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;

        Self::hydrate(db, row, user_id).await
    }

    async fn hydrate(db: &PgPool, row: ConversationRow, user_id: Uuid) -> AppResult<ConversationDto> {
        let participants = Self::load_participants(db, row.id).await?;
        let last_read_at = participants
            .iter()
            .find(|p| p.user.id == user_id)
            .and_then(|p| p.last_read_at);

        let last_message_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM messages \
             WHERE conversation_id = $1 AND is_deleted = FALSE \
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(row.id)
        .fetch_optional(db)
        .await?;

        let last_message = match last_message_id {
            Some(id) => MessageService::load_message(db, id).await?,
            None => None,
        };

        let unread_count = Self::unread_count(db, row.id, user_id, last_read_at).await?;

        Ok(ConversationDto {
            id: row.id,
            conversation_type: ConversationType::from_str(&row.conversation_type),
            name: row.name,
            cohort_id: row.cohort_id,
            class_id: row.class_id,
            created_by: row.created_by,
            is_archived: row.is_archived,
            last_message_at: row.last_message_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            participants,
            last_message,
            unread_count,
        })
    }

    async fn load_participants(db: &PgPool, conversation_id: Uuid) -> AppResult<Vec<ParticipantDto>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT cp.user_id, u.email, u.role AS user_role, cp.role, cp.last_read_at, cp.joined_at \
             FROM conversation_participants cp \
             JOIN users u ON u.id = cp.user_id \
             WHERE cp.conversation_id = $1 \
             ORDER BY cp.joined_at ASC",
        )
        .bind(conversation_id)
        .fetch_all(db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ParticipantDto {
                user: UserProfile {
                    id: r.user_id,
                    email: r.email,
                    role: UserRole::from_str(&r.user_role),
                },
                role: ParticipantRole::from_str(&r.role),
                last_read_at: r.last_read_at,
                joined_at: r.joined_at,
            })
            .collect())
    }

    /// Messages from other senders, not deleted, newer than the caller's
    /// read watermark. A never-read participant counts everything.
    async fn unread_count(
        db: &PgPool,
        conversation_id: Uuid,
        user_id: Uuid,
        last_read_at: Option<DateTime<Utc>>,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE conversation_id = $1 \
               AND is_deleted = FALSE \
               AND sender_id <> $2 \
               AND created_at > COALESCE($3, 'epoch'::timestamptz)",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(last_read_at)
        .fetch_one(db)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(
            ConversationService::direct_key(a, b),
            ConversationService::direct_key(b, a)
        );
    }

    #[test]
    fn direct_key_sorts_ids() {
        let lo = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let hi = Uuid::parse_str("ffffffff-ffff-ffff-ffff-ffffffffffff").unwrap();
        assert_eq!(
            ConversationService::direct_key(hi, lo),
            format!("{lo}:{hi}")
        );
    }

    #[test]
    fn participant_set_dedups_and_keeps_creator_first() {
        let creator = Uuid::new_v4();
        let other = Uuid::new_v4();
        let set = ConversationService::participant_set(creator, &[other, creator, other]);
        assert_eq!(set, vec![creator, other]);
    }
}
