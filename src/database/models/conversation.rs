use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::models::AdminUser;

/// Unordered pair of conversation participants, stored low-then-high so that
/// `(a, b)` and `(b, a)` name the same conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantPair {
    low: Uuid,
    high: Uuid,
}

impl ParticipantPair {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }

    pub fn contains(&self, user: Uuid) -> bool {
        self.low == user || self.high == user
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub participants: [Uuid; 2],
    pub last_message: String,
    pub last_sender: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(pair: ParticipantPair, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            participants: [pair.low(), pair.high()],
            last_message: String::new(),
            last_sender: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn pair(&self) -> ParticipantPair {
        ParticipantPair::new(self.participants[0], self.participants[1])
    }

    pub fn has_participant(&self, user: Uuid) -> bool {
        self.pair().contains(user)
    }
}

/// Display fields of one participant, as embedded in conversation listings.
/// Name, role and color are absent when the account is unknown to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Uuid,
    pub name: Option<String>,
    pub role: Option<String>,
    pub color: Option<String>,
}

impl Participant {
    fn resolve(id: Uuid, users: &HashMap<Uuid, AdminUser>) -> Self {
        match users.get(&id) {
            Some(user) => Self {
                id,
                name: Some(user.name.clone()),
                role: Some(user.role.clone()),
                color: Some(user.color.clone()),
            },
            None => Self {
                id,
                name: None,
                role: None,
                color: None,
            },
        }
    }
}

/// A conversation with its participants resolved for the sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub participants: Vec<Participant>,
    pub last_message: String,
    pub last_sender: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn new(conversation: Conversation, users: &HashMap<Uuid, AdminUser>) -> Self {
        Self {
            id: conversation.id,
            participants: conversation
                .participants
                .iter()
                .map(|id| Participant::resolve(*id, users))
                .collect(),
            last_message: conversation.last_message,
            last_sender: conversation.last_sender,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        }
    }
}
