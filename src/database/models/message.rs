use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: Uuid,
    pub receiver: Uuid,
    pub text: String,
    #[sqlx(rename = "is_read")]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_expired(&self, cutoff: DateTime<Utc>) -> bool {
        self.created_at <= cutoff
    }
}

/// Input for message creation. `text` is already trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender: Uuid,
    pub receiver: Uuid,
    pub text: String,
}

impl NewMessage {
    pub fn into_message(self, now: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id: self.conversation_id,
            sender: self.sender,
            receiver: self.receiver,
            text: self.text,
            read: false,
            created_at: now,
        }
    }
}

/// Unread messages addressed to one user, grouped by sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub sender: Uuid,
    pub count: i64,
}
