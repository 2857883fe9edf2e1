use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::models::{
    AdminUser, AuditLog, Conversation, Message, NewAuditLog, NewMessage, ParticipantPair, UnreadCount,
};
use crate::database::store::{ChatStore, StoreError};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "conversations" (
        "id" UUID PRIMARY KEY,
        "participant_low" UUID NOT NULL,
        "participant_high" UUID NOT NULL,
        "last_message" TEXT NOT NULL DEFAULT '',
        "last_sender" UUID,
        "created_at" TIMESTAMPTZ NOT NULL DEFAULT now(),
        "updated_at" TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT "conversations_pair_key" UNIQUE ("participant_low", "participant_high")
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "messages" (
        "id" UUID PRIMARY KEY,
        "conversation_id" UUID NOT NULL REFERENCES "conversations" ("id"),
        "sender" UUID NOT NULL,
        "receiver" UUID NOT NULL,
        "text" TEXT NOT NULL CHECK (length(btrim("text")) > 0),
        "is_read" BOOLEAN NOT NULL DEFAULT false,
        "created_at" TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE INDEX IF NOT EXISTS "messages_conversation_created_idx" ON "messages" ("conversation_id", "created_at")"#,
    r#"CREATE INDEX IF NOT EXISTS "messages_receiver_unread_idx" ON "messages" ("receiver") WHERE NOT "is_read""#,
    r#"CREATE INDEX IF NOT EXISTS "messages_created_idx" ON "messages" ("created_at")"#,
    r#"CREATE TABLE IF NOT EXISTS "audit_logs" (
        "id" UUID PRIMARY KEY,
        "user_email" TEXT NOT NULL,
        "role" TEXT NOT NULL,
        "action" TEXT NOT NULL,
        "target" TEXT NOT NULL,
        "details" JSONB NOT NULL DEFAULT '{}'::jsonb,
        "ip_address" TEXT NOT NULL DEFAULT '',
        "user_agent" TEXT NOT NULL DEFAULT '',
        "created_at" TIMESTAMPTZ NOT NULL DEFAULT now(),
        "updated_at" TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "admin_users" (
        "id" UUID PRIMARY KEY,
        "name" TEXT NOT NULL,
        "email" TEXT NOT NULL UNIQUE,
        "role" TEXT NOT NULL DEFAULT 'super_admin',
        "color" TEXT NOT NULL DEFAULT '#3B82F6',
        "is_active" BOOLEAN NOT NULL DEFAULT true
    )"#,
];

const CONVERSATION_COLUMNS: &str =
    r#""id", "participant_low", "participant_high", "last_message", "last_sender", "created_at", "updated_at""#;

const MESSAGE_COLUMNS: &str = r#""id", "conversation_id", "sender", "receiver", "text", "is_read", "created_at""#;

#[derive(Debug, FromRow)]
struct ConversationRow {
    id: Uuid,
    participant_low: Uuid,
    participant_high: Uuid,
    last_message: String,
    last_sender: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            participants: [row.participant_low, row.participant_high],
            last_message: row.last_message,
            last_sender: row.last_sender,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Postgres-backed chat store
pub struct PgChatStore {
    pool: PgPool,
    message_ttl: chrono::Duration,
}

impl PgChatStore {
    pub fn new(pool: PgPool, message_ttl: chrono::Duration) -> Self {
        Self { pool, message_ttl }
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn cutoff(&self) -> DateTime<Utc> {
        Utc::now()
            .checked_sub_signed(self.message_ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn find_or_create_conversation(&self, pair: ParticipantPair) -> Result<Conversation, StoreError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let sql = format!(
            r#"INSERT INTO "conversations" ("id", "participant_low", "participant_high")
               VALUES ($1, $2, $3)
               ON CONFLICT ("participant_low", "participant_high")
               DO UPDATE SET "participant_low" = EXCLUDED."participant_low"
               RETURNING {}"#,
            CONVERSATION_COLUMNS
        );

        let row: ConversationRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(pair.low())
            .bind(pair.high())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn find_conversation(&self, id: Uuid) -> Result<Option<Conversation>, StoreError> {
        let sql = format!(r#"SELECT {} FROM "conversations" WHERE "id" = $1"#, CONVERSATION_COLUMNS);
        let row: Option<ConversationRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(Into::into))
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let sql = format!(
            r#"INSERT INTO "messages" ("id", "conversation_id", "sender", "receiver", "text")
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {}"#,
            MESSAGE_COLUMNS
        );

        let created: Message = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(message.conversation_id)
            .bind(message.sender)
            .bind(message.receiver)
            .bind(&message.text)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn touch_conversation(
        &self,
        id: Uuid,
        last_message: &str,
        last_sender: Uuid,
    ) -> Result<Conversation, StoreError> {
        let sql = format!(
            r#"UPDATE "conversations"
               SET "last_message" = $2, "last_sender" = $3, "updated_at" = now()
               WHERE "id" = $1
               RETURNING {}"#,
            CONVERSATION_COLUMNS
        );

        let row: Option<ConversationRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(last_message)
            .bind(last_sender)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Into::into)
            .ok_or_else(|| StoreError::NotFound(format!("conversation {}", id)))
    }

    async fn mark_read(&self, conversation_id: Uuid, receiver: Uuid) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            r#"UPDATE "messages" SET "is_read" = true
               WHERE "conversation_id" = $1 AND "receiver" = $2 AND NOT "is_read" AND "created_at" > $3
               RETURNING {}"#,
            MESSAGE_COLUMNS
        );

        let mut flipped: Vec<Message> = sqlx::query_as(&sql)
            .bind(conversation_id)
            .bind(receiver)
            .bind(self.cutoff())
            .fetch_all(&self.pool)
            .await?;
        flipped.sort_by_key(|m| m.created_at);
        Ok(flipped)
    }

    async fn conversations_for(&self, user: Uuid) -> Result<Vec<Conversation>, StoreError> {
        let sql = format!(
            r#"SELECT {} FROM "conversations"
               WHERE "participant_low" = $1 OR "participant_high" = $1
               ORDER BY "updated_at" DESC"#,
            CONVERSATION_COLUMNS
        );
        let rows: Vec<ConversationRow> = sqlx::query_as(&sql).bind(user).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn unread_counts(&self, user: Uuid) -> Result<Vec<UnreadCount>, StoreError> {
        let counts: Vec<UnreadCount> = sqlx::query_as(
            r#"SELECT "sender", COUNT(*) AS "count" FROM "messages"
               WHERE "receiver" = $1 AND NOT "is_read" AND "created_at" > $2
               GROUP BY "sender"
               ORDER BY "sender""#,
        )
        .bind(user)
        .bind(self.cutoff())
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn messages_in(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            r#"SELECT {} FROM "messages"
               WHERE "conversation_id" = $1 AND "created_at" > $2
               ORDER BY "created_at" ASC"#,
            MESSAGE_COLUMNS
        );
        let messages: Vec<Message> = sqlx::query_as(&sql)
            .bind(conversation_id)
            .bind(self.cutoff())
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(r#"DELETE FROM "messages" WHERE "created_at" <= $1"#)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_audit_log(&self, record: NewAuditLog) -> Result<AuditLog, StoreError> {
        let saved: AuditLog = sqlx::query_as(
            r#"INSERT INTO "audit_logs"
               ("id", "user_email", "role", "action", "target", "details", "ip_address", "user_agent")
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING "id", "user_email", "role", "action", "target", "details",
                         "ip_address", "user_agent", "created_at", "updated_at""#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.user_email)
        .bind(&record.role)
        .bind(&record.action)
        .bind(&record.target)
        .bind(&record.details)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    async fn active_users(&self) -> Result<Vec<AdminUser>, StoreError> {
        let users: Vec<AdminUser> = sqlx::query_as(
            r#"SELECT "id", "name", "email", "role", "color", "is_active" FROM "admin_users"
               WHERE "is_active" ORDER BY "name""#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<AdminUser>, StoreError> {
        let users: Vec<AdminUser> = sqlx::query_as(
            r#"SELECT "id", "name", "email", "role", "color", "is_active" FROM "admin_users"
               WHERE "id" = ANY($1)"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
