//! Wire format of the `/ws` endpoint.
//!
//! Inbound frames are `{ "type": <OPERATION>, ...payload }`, outbound events
//! are `{ "type": <EVENT>, "data": <payload> }`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::{AuditLog, Message};

/// Operations a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFrame {
    Auth {
        token: String,
    },
    SendMessage {
        #[serde(rename = "receiverId", default)]
        receiver_id: Option<Uuid>,
        #[serde(default)]
        text: Option<String>,
    },
    ReadMessage {
        #[serde(rename = "conversationId")]
        conversation_id: Uuid,
    },
    TypingStart {
        #[serde(rename = "receiverId")]
        receiver_id: Uuid,
    },
    TypingStop {
        #[serde(rename = "receiverId")]
        receiver_id: Uuid,
    },
}

impl ClientFrame {
    /// Parse one text frame. Anything unparseable, including unknown
    /// operation types, yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientFrame::Auth { .. } => "AUTH",
            ClientFrame::SendMessage { .. } => "SEND_MESSAGE",
            ClientFrame::ReadMessage { .. } => "READ_MESSAGE",
            ClientFrame::TypingStart { .. } => "TYPING_START",
            ClientFrame::TypingStop { .. } => "TYPING_STOP",
        }
    }
}

/// Sidebar sync payload broadcast after every sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationUpdate {
    pub conversation_id: Uuid,
    pub sender: Uuid,
    pub receiver: Uuid,
    pub last_message: String,
    pub updated_at: DateTime<Utc>,
}

/// Events pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    AuthSuccess {
        #[serde(rename = "userId")]
        user_id: Uuid,
    },
    AuthError {},
    NewMessage(Message),
    MessageDelivered {
        #[serde(rename = "messageId")]
        message_id: Uuid,
    },
    MessageRead {
        #[serde(rename = "messageId")]
        message_id: Uuid,
    },
    ConversationUpdate(ConversationUpdate),
    TypingStart {
        #[serde(rename = "userId")]
        user_id: Uuid,
    },
    TypingStop {
        #[serde(rename = "userId")]
        user_id: Uuid,
    },
    UserOnline {
        #[serde(rename = "userId")]
        user_id: Uuid,
    },
    UserOffline {
        #[serde(rename = "userId")]
        user_id: Uuid,
    },
    NewAuditLog(AuditLog),
}

impl ServerEvent {
    /// Serialize once so the same frame can be shared by every recipient.
    pub fn encode(&self) -> Result<Arc<str>, serde_json::Error> {
        serde_json::to_string(self).map(Arc::from)
    }
}
