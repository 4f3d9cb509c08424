use sqlx::{Pool, Postgres};

// Embed SQL migrations at compile time for deterministic startup
const MIG_0001: &str = include_str!("../migrations/0001_create_users.sql");
const MIG_0002: &str = include_str!("../migrations/0002_create_conversations.sql");
const MIG_0003: &str = include_str!("../migrations/0003_create_conversation_participants.sql");
const MIG_0004: &str = include_str!("../migrations/0004_create_messages.sql");
const MIG_0005: &str = include_str!("../migrations/0005_create_message_reactions.sql");
const MIG_0006: &str = include_str!("../migrations/0006_create_message_read_receipts.sql");

pub async fn run_all(db: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    // Run sequentially; each migration may contain multiple statements
    // (raw_sql uses the simple query protocol, which allows that) and
    // every statement is IF NOT EXISTS, so reruns are harmless.
    let all = [MIG_0001, MIG_0002, MIG_0003, MIG_0004, MIG_0005, MIG_0006];
    for (i, sql) in all.into_iter().enumerate() {
        let label = i + 1;
        sqlx::raw_sql(sql).execute(db).await?;
        tracing::info!(migration = %label, "migration applied");
    }
    Ok(())
}
