use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::guards::Participant;
use crate::models::{MessageDto, MessageType, ReactionDto, ReadReceiptDto, UserProfile, UserRole};

pub const PAGE_SIZE: i64 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub content: Option<String>,
    #[serde(rename = "type", default)]
    pub message_type: Option<MessageType>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub parent_id: Option<Uuid>,
}

impl NewMessage {
    /// Content as stored: trimmed, with whitespace-only collapsed to NULL
    /// so attachment-only messages never carry an empty string.
    pub fn normalized_content(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// One page of messages, newest first, plus the cursor for the next
/// (older) page when more remain.
pub struct MessagePage {
    pub messages: Vec<MessageDto>,
    pub next_cursor: Option<Uuid>,
}

pub enum ReactionToggle {
    Added(ReactionDto),
    Removed,
}

impl ReactionToggle {
    pub fn action(&self) -> &'static str {
        match self {
            ReactionToggle::Added(_) => "added",
            ReactionToggle::Removed => "removed",
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    sender_email: String,
    sender_role: String,
    content: Option<String>,
    message_type: String,
    file_url: Option<String>,
    file_name: Option<String>,
    file_size: Option<i64>,
    parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ReactionRow {
    id: Uuid,
    message_id: Uuid,
    emoji: String,
    created_at: DateTime<Utc>,
    user_id: Uuid,
    email: String,
    user_role: String,
}

#[derive(sqlx::FromRow)]
struct ReceiptRow {
    message_id: Uuid,
    read_at: DateTime<Utc>,
    user_id: Uuid,
    email: String,
    user_role: String,
}

const MESSAGE_COLUMNS: &str = "m.id, m.conversation_id, m.sender_id, u.email AS sender_email, \
     u.role AS sender_role, m.content, m.message_type, m.file_url, m.file_name, m.file_size, \
     m.parent_id, m.created_at";

pub struct MessageService;

impl MessageService {
    /// A message must carry text or a file reference; file messages must
    /// name a type that matches.
    pub fn validate_send(input: &NewMessage) -> AppResult<MessageType> {
        let has_content = input.normalized_content().is_some();
        let has_file = input.file_url.is_some();

        if !has_content && !has_file {
            return Err(AppError::Validation(
                "message requires content or a file".into(),
            ));
        }

        let message_type = input.message_type.unwrap_or(if has_file {
            MessageType::File
        } else {
            MessageType::Text
        });

        if message_type != MessageType::Text && !has_file {
            return Err(AppError::Validation(
                "file and image messages require a fileUrl".into(),
            ));
        }

        Ok(message_type)
    }

    /// Fetch one page of messages for a verified participant, newest
    /// first. Passing a cursor returns messages strictly older than the
    /// cursor row; a full page yields the next cursor. As a side effect
    /// the caller's read watermark advances to now.
    pub async fn fetch_page(
        db: &PgPool,
        participant: &Participant,
        cursor: Option<Uuid>,
    ) -> AppResult<MessagePage> {
        let rows = match cursor {
            None => {
                sqlx::query_as::<_, MessageRow>(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages m \
                     JOIN users u ON u.id = m.sender_id \
                     WHERE m.conversation_id = $1 AND m.is_deleted = FALSE \
                     ORDER BY m.created_at DESC, m.id DESC \
                     LIMIT $2",
                ))
                .bind(participant.conversation_id)
                .bind(PAGE_SIZE)
                .fetch_all(db)
                .await?
            }
            Some(cursor_id) => {
                // Resolve the cursor to its sort position; row-value
                // comparison keeps pagination stable under equal timestamps.
                let anchor: Option<(DateTime<Utc>, Uuid)> = sqlx::query_as(
                    "SELECT created_at, id FROM messages \
                     WHERE id = $1 AND conversation_id = $2",
                )
                .bind(cursor_id)
                .bind(participant.conversation_id)
                .fetch_optional(db)
                .await?;
                let (anchor_at, anchor_id) =
                    anchor.ok_or_else(|| AppError::Validation("unknown cursor".into()))?;

                sqlx::query_as::<_, MessageRow>(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages m \
                     JOIN users u ON u.id = m.sender_id \
                     WHERE m.conversation_id = $1 AND m.is_deleted = FALSE \
                       AND (m.created_at, m.id) < ($2, $3) \
                     ORDER BY m.created_at DESC, m.id DESC \
                     LIMIT $4",
                ))
                .bind(participant.conversation_id)
                .bind(anchor_at)
                .bind(anchor_id)
                .bind(PAGE_SIZE)
                .fetch_all(db)
                .await?
            }
        };

        let next_cursor = if rows.len() as i64 == PAGE_SIZE {
            rows.last().map(|r| r.id)
        } else {
            None
        };

        let messages = Self::hydrate_rows(db, rows).await?;
        Self::mark_read(db, participant.conversation_id, participant.user_id).await?;

        Ok(MessagePage {
            messages,
            next_cursor,
        })
    }

    /// Advance the caller's read watermark. GREATEST keeps it monotonic
    /// even when a lagging writer commits late.
    pub async fn mark_read(db: &PgPool, conversation_id: Uuid, user_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE conversation_participants \
             SET last_read_at = GREATEST(COALESCE(last_read_at, 'epoch'::timestamptz), NOW()) \
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Persist a message. The insert, the conversation activity bump and
    /// the sender's own read receipt commit atomically; realtime publish
    /// is the caller's concern and happens after the commit.
    pub async fn send_message(
        db: &PgPool,
        participant: &Participant,
        input: NewMessage,
    ) -> AppResult<MessageDto> {
        let message_type = Self::validate_send(&input)?;

        if let Some(parent_id) = input.parent_id {
            let parent_exists: Option<Uuid> = sqlx::query_scalar(
                "SELECT id FROM messages WHERE id = $1 AND conversation_id = $2",
            )
            .bind(parent_id)
            .bind(participant.conversation_id)
            .fetch_optional(db)
            .await?;
            if parent_exists.is_none() {
                return Err(AppError::Validation(
                    "parent message is not in this conversation".into(),
                ));
            }
        }

        let message_id = Uuid::new_v4();
        let mut tx = db.begin().await?;

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            "INSERT INTO messages \
             (id, conversation_id, sender_id, content, message_type, file_url, file_name, file_size, parent_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING created_at",
        )
        .bind(message_id)
        .bind(participant.conversation_id)
        .bind(participant.user_id)
        .bind(input.normalized_content())
        .bind(message_type.as_str())
        .bind(&input.file_url)
        .bind(&input.file_name)
        .bind(input.file_size)
        .bind(input.parent_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE conversations SET last_message_at = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(participant.conversation_id)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        // The sender has trivially read their own message.
        sqlx::query(
            "INSERT INTO message_read_receipts (message_id, user_id) \
             VALUES ($1, $2) ON CONFLICT (message_id, user_id) DO NOTHING",
        )
        .bind(message_id)
        .bind(participant.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        crate::metrics::MESSAGES_SENT_TOTAL.inc();

        Self::load_message(db, message_id)
            .await?
            .ok_or(AppError::Internal)
    }

    /// Toggle the caller's reaction on a message. Delete-if-present /
    /// insert-if-absent against the unique (message, user, emoji) triple,
    /// so concurrent toggles settle to one of the two states.
    pub async fn toggle_reaction(
        db: &PgPool,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> AppResult<(Uuid, ReactionToggle)> {
        let emoji = emoji.trim();
        if emoji.is_empty() || emoji.len() > 32 {
            return Err(AppError::Validation("invalid emoji".into()));
        }

        let conversation_id: Uuid = sqlx::query_scalar(
            "SELECT conversation_id FROM messages WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(message_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;

        Participant::verify(db, user_id, conversation_id).await?;

        let removed: Option<Uuid> = sqlx::query_scalar(
            "DELETE FROM message_reactions \
             WHERE message_id = $1 AND user_id = $2 AND emoji = $3 \
             RETURNING id",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .fetch_optional(db)
        .await?;

        if removed.is_some() {
            return Ok((conversation_id, ReactionToggle::Removed));
        }

        sqlx::query(
            "INSERT INTO message_reactions (message_id, user_id, emoji) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (message_id, user_id, emoji) DO NOTHING",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .execute(db)
        .await?;

        let row = sqlx::query_as::<_, ReactionRow>(
            "SELECT r.id, r.message_id, r.emoji, r.created_at, u.id AS user_id, u.email, \
                    u.role AS user_role \
             FROM message_reactions r \
             JOIN users u ON u.id = r.user_id \
             WHERE r.message_id = $1 AND r.user_id = $2 AND r.emoji = $3",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .fetch_optional(db)
        .await?;

        // A concurrent toggle may have removed the row between insert and
        // re-select; report whichever state actually holds.
        match row {
            Some(row) => Ok((conversation_id, ReactionToggle::Added(reaction_dto(row)))),
            None => Ok((conversation_id, ReactionToggle::Removed)),
        }
    }

    pub async fn reactions_for_message(db: &PgPool, message_id: Uuid) -> AppResult<Vec<ReactionDto>> {
        let rows = sqlx::query_as::<_, ReactionRow>(
            "SELECT r.id, r.message_id, r.emoji, r.created_at, u.id AS user_id, u.email, \
                    u.role AS user_role \
             FROM message_reactions r \
             JOIN users u ON u.id = r.user_id \
             WHERE r.message_id = $1 \
             ORDER BY r.created_at ASC",
        )
        .bind(message_id)
        .fetch_all(db)
        .await?;

        Ok(rows.into_iter().map(reaction_dto).collect())
    }

    /// Load a single fully-populated message.
    pub async fn load_message(db: &PgPool, message_id: Uuid) -> AppResult<Option<MessageDto>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m \
             JOIN users u ON u.id = m.sender_id \
             WHERE m.id = $1 AND m.is_deleted = FALSE",
        ))
        .bind(message_id)
        .fetch_optional(db)
        .await?;

        match row {
            Some(row) => Ok(Self::hydrate_rows(db, vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    /// Attach reactions and read receipts to a batch of message rows with
    /// one query per side table.
    async fn hydrate_rows(db: &PgPool, rows: Vec<MessageRow>) -> AppResult<Vec<MessageDto>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let reaction_rows = sqlx::query_as::<_, ReactionRow>(
            "SELECT r.id, r.message_id, r.emoji, r.created_at, u.id AS user_id, u.email, \
                    u.role AS user_role \
             FROM message_reactions r \
             JOIN users u ON u.id = r.user_id \
             WHERE r.message_id = ANY($1) \
             ORDER BY r.created_at ASC",
        )
        .bind(&ids)
        .fetch_all(db)
        .await?;

        let mut reactions: HashMap<Uuid, Vec<ReactionDto>> = HashMap::new();
        for row in reaction_rows {
            let message_id = row.message_id;
            reactions.entry(message_id).or_default().push(reaction_dto(row));
        }

        let receipt_rows = sqlx::query_as::<_, ReceiptRow>(
            "SELECT rr.message_id, rr.read_at, u.id AS user_id, u.email, u.role AS user_role \
             FROM message_read_receipts rr \
             JOIN users u ON u.id = rr.user_id \
             WHERE rr.message_id = ANY($1) \
             ORDER BY rr.read_at ASC",
        )
        .bind(&ids)
        .fetch_all(db)
        .await?;

        let mut receipts: HashMap<Uuid, Vec<ReadReceiptDto>> = HashMap::new();
        for row in receipt_rows {
            receipts.entry(row.message_id).or_default().push(ReadReceiptDto {
                user: UserProfile {
                    id: row.user_id,
                    email: row.email,
                    role: UserRole::from_str(&row.user_role),
                },
                read_at: row.read_at,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| MessageDto {
                id: row.id,
                conversation_id: row.conversation_id,
                sender: UserProfile {
                    id: row.sender_id,
                    email: row.sender_email,
                    role: UserRole::from_str(&row.sender_role),
                },
                content: row.content,
                message_type: MessageType::from_str(&row.message_type),
                file_url: row.file_url,
                file_name: row.file_name,
                file_size: row.file_size,
                parent_id: row.parent_id,
                created_at: row.created_at,
                reactions: reactions.remove(&row.id).unwrap_or_default(),
                read_receipts: receipts.remove(&row.id).unwrap_or_default(),
            })
            .collect())
    }
}

fn reaction_dto(row: ReactionRow) -> ReactionDto {
    ReactionDto {
        id: row.id,
        emoji: row.emoji,
        user: UserProfile {
            id: row.user_id,
            email: row.email,
            role: UserRole::from_str(&row.user_role),
        },
        created_at: row.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_message(content: &str) -> NewMessage {
        NewMessage {
            content: Some(content.into()),
            message_type: None,
            file_url: None,
            file_name: None,
            file_size: None,
            parent_id: None,
        }
    }

    #[test]
    fn text_content_defaults_to_text_type() {
        let kind = MessageService::validate_send(&text_message("hello")).unwrap();
        assert_eq!(kind, MessageType::Text);
    }

    #[test]
    fn empty_message_is_rejected() {
        assert!(MessageService::validate_send(&text_message("   ")).is_err());
        let bare = NewMessage {
            content: None,
            message_type: None,
            file_url: None,
            file_name: None,
            file_size: None,
            parent_id: None,
        };
        assert!(MessageService::validate_send(&bare).is_err());
    }

    #[test]
    fn file_url_defaults_to_file_type() {
        let input = NewMessage {
            content: None,
            message_type: None,
            file_url: Some("https://files.example/doc.pdf".into()),
            file_name: Some("doc.pdf".into()),
            file_size: Some(1024),
            parent_id: None,
        };
        assert_eq!(
            MessageService::validate_send(&input).unwrap(),
            MessageType::File
        );
    }

    #[test]
    fn whitespace_content_normalizes_to_null_for_attachment_messages() {
        let input = NewMessage {
            content: Some("   ".into()),
            message_type: None,
            file_url: Some("https://files.example/notes.pdf".into()),
            file_name: Some("notes.pdf".into()),
            file_size: Some(2048),
            parent_id: None,
        };
        assert_eq!(input.normalized_content(), None);
        assert_eq!(
            MessageService::validate_send(&input).unwrap(),
            MessageType::File
        );

        let padded = text_message("  hello  ");
        assert_eq!(padded.normalized_content(), Some("hello"));
    }

    #[test]
    fn image_type_without_file_is_rejected() {
        let input = NewMessage {
            content: Some("look".into()),
            message_type: Some(MessageType::Image),
            file_url: None,
            file_name: None,
            file_size: None,
            parent_id: None,
        };
        assert!(MessageService::validate_send(&input).is_err());
    }
}
