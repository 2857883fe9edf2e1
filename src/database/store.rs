use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{
    AdminUser, AuditLog, Conversation, Message, NewAuditLog, NewMessage, ParticipantPair, UnreadCount,
};

/// Errors from a chat store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// System of record for conversations, messages and audit records.
///
/// Reads never return messages whose `created_at` is older than the store's
/// message TTL, whether or not the retention sweep has physically removed
/// them yet.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Return the conversation for this participant pair, creating it if none
    /// exists. At most one conversation exists per pair.
    async fn find_or_create_conversation(&self, pair: ParticipantPair) -> Result<Conversation, StoreError>;

    async fn find_conversation(&self, id: Uuid) -> Result<Option<Conversation>, StoreError>;

    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// Update the last-message cache. Last writer wins.
    async fn touch_conversation(
        &self,
        id: Uuid,
        last_message: &str,
        last_sender: Uuid,
    ) -> Result<Conversation, StoreError>;

    /// Flip every unread message in `conversation_id` addressed to `receiver`
    /// to read, returning exactly the messages that changed.
    async fn mark_read(&self, conversation_id: Uuid, receiver: Uuid) -> Result<Vec<Message>, StoreError>;

    /// Conversations the user takes part in, most recently updated first.
    async fn conversations_for(&self, user: Uuid) -> Result<Vec<Conversation>, StoreError>;

    async fn unread_counts(&self, user: Uuid) -> Result<Vec<UnreadCount>, StoreError>;

    /// Live messages of a conversation, oldest first.
    async fn messages_in(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError>;

    /// Hard-delete messages created at or before `cutoff`.
    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn insert_audit_log(&self, record: NewAuditLog) -> Result<AuditLog, StoreError>;

    async fn active_users(&self) -> Result<Vec<AdminUser>, StoreError>;

    /// Admin accounts with the given ids, active or not. Unknown ids are skipped.
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<AdminUser>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
