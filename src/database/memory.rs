use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::{
    AdminUser, AuditLog, Conversation, Message, NewAuditLog, NewMessage, ParticipantPair, UnreadCount,
};
use crate::database::store::{ChatStore, StoreError};

#[derive(Default)]
struct Inner {
    conversations: HashMap<Uuid, Conversation>,
    by_pair: HashMap<ParticipantPair, Uuid>,
    messages: Vec<Message>,
    audit_logs: Vec<AuditLog>,
    users: Vec<AdminUser>,
}

/// Process-local chat store. Used in development when no database is
/// configured, and by tests.
pub struct MemoryChatStore {
    inner: RwLock<Inner>,
    message_ttl: chrono::Duration,
}

impl MemoryChatStore {
    pub fn new(message_ttl: chrono::Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            message_ttl,
        }
    }

    pub fn with_users(message_ttl: chrono::Duration, users: Vec<AdminUser>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                users,
                ..Inner::default()
            }),
            message_ttl,
        }
    }

    pub async fn add_user(&self, user: AdminUser) {
        self.inner.write().await.users.push(user);
    }

    pub async fn conversation_count(&self) -> usize {
        self.inner.read().await.conversations.len()
    }

    pub async fn audit_logs(&self) -> Vec<AuditLog> {
        self.inner.read().await.audit_logs.clone()
    }

    fn cutoff(&self) -> DateTime<Utc> {
        Utc::now()
            .checked_sub_signed(self.message_ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    #[cfg(test)]
    async fn backdate_message(&self, id: Uuid, created_at: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        if let Some(message) = inner.messages.iter_mut().find(|m| m.id == id) {
            message.created_at = created_at;
        }
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn find_or_create_conversation(&self, pair: ParticipantPair) -> Result<Conversation, StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(id) = inner.by_pair.get(&pair).copied() {
            if let Some(existing) = inner.conversations.get(&id) {
                return Ok(existing.clone());
            }
        }

        let conversation = Conversation::new(pair, Utc::now());
        inner.by_pair.insert(pair, conversation.id);
        inner.conversations.insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn find_conversation(&self, id: Uuid) -> Result<Option<Conversation>, StoreError> {
        Ok(self.inner.read().await.conversations.get(&id).cloned())
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.conversations.contains_key(&message.conversation_id) {
            return Err(StoreError::NotFound(format!("conversation {}", message.conversation_id)));
        }

        let message = message.into_message(Utc::now());
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn touch_conversation(
        &self,
        id: Uuid,
        last_message: &str,
        last_sender: Uuid,
    ) -> Result<Conversation, StoreError> {
        let mut inner = self.inner.write().await;
        let conversation = inner
            .conversations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("conversation {}", id)))?;

        conversation.last_message = last_message.to_string();
        conversation.last_sender = Some(last_sender);
        conversation.updated_at = Utc::now();
        Ok(conversation.clone())
    }

    async fn mark_read(&self, conversation_id: Uuid, receiver: Uuid) -> Result<Vec<Message>, StoreError> {
        let cutoff = self.cutoff();
        let mut inner = self.inner.write().await;

        let mut flipped = Vec::new();
        for message in inner.messages.iter_mut().filter(|m| {
            m.conversation_id == conversation_id && m.receiver == receiver && !m.read && !m.is_expired(cutoff)
        }) {
            message.read = true;
            flipped.push(message.clone());
        }
        Ok(flipped)
    }

    async fn conversations_for(&self, user: Uuid) -> Result<Vec<Conversation>, StoreError> {
        let inner = self.inner.read().await;
        let mut conversations: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|c| c.has_participant(user))
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn unread_counts(&self, user: Uuid) -> Result<Vec<UnreadCount>, StoreError> {
        let cutoff = self.cutoff();
        let inner = self.inner.read().await;

        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for message in inner
            .messages
            .iter()
            .filter(|m| m.receiver == user && !m.read && !m.is_expired(cutoff))
        {
            *counts.entry(message.sender).or_default() += 1;
        }

        let mut counts: Vec<UnreadCount> = counts
            .into_iter()
            .map(|(sender, count)| UnreadCount { sender, count })
            .collect();
        counts.sort_by_key(|c| c.sender);
        Ok(counts)
    }

    async fn messages_in(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let cutoff = self.cutoff();
        let inner = self.inner.read().await;
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id && !m.is_expired(cutoff))
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.messages.len();
        inner.messages.retain(|m| !m.is_expired(cutoff));
        Ok((before - inner.messages.len()) as u64)
    }

    async fn insert_audit_log(&self, record: NewAuditLog) -> Result<AuditLog, StoreError> {
        let record = record.into_record(Utc::now());
        self.inner.write().await.audit_logs.push(record.clone());
        Ok(record)
    }

    async fn active_users(&self) -> Result<Vec<AdminUser>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().filter(|u| u.is_active).cloned().collect())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<AdminUser>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().filter(|u| ids.contains(&u.id)).cloned().collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> MemoryChatStore {
        MemoryChatStore::new(Duration::hours(24))
    }

    async fn send(store: &MemoryChatStore, from: Uuid, to: Uuid, text: &str) -> Message {
        let conversation = store
            .find_or_create_conversation(ParticipantPair::new(from, to))
            .await
            .unwrap();
        store
            .create_message(NewMessage {
                conversation_id: conversation.id,
                sender: from,
                receiver: to,
                text: text.to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn one_conversation_per_pair() {
        let store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let first = store.find_or_create_conversation(ParticipantPair::new(a, b)).await.unwrap();
        let second = store.find_or_create_conversation(ParticipantPair::new(b, a)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.conversation_count().await, 1);
    }

    #[tokio::test]
    async fn mark_read_returns_only_flipped_messages() {
        let store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let m1 = send(&store, a, b, "one").await;
        let m2 = send(&store, a, b, "two").await;
        let reply = send(&store, b, a, "reply").await;

        let flipped = store.mark_read(m1.conversation_id, b).await.unwrap();
        let ids: Vec<Uuid> = flipped.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![m1.id, m2.id]);

        assert!(store.mark_read(m1.conversation_id, b).await.unwrap().is_empty());

        let history = store.messages_in(m1.conversation_id).await.unwrap();
        let reply_state = history.iter().find(|m| m.id == reply.id).unwrap();
        assert!(!reply_state.read);
    }

    #[tokio::test]
    async fn expired_messages_are_hidden_then_purged() {
        let store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let old = send(&store, a, b, "old").await;
        let fresh = send(&store, a, b, "fresh").await;
        store.backdate_message(old.id, Utc::now() - Duration::hours(25)).await;

        let history = store.messages_in(old.conversation_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, fresh.id);

        let unread = store.unread_counts(b).await.unwrap();
        assert_eq!(unread, vec![UnreadCount { sender: a, count: 1 }]);

        let purged = store.purge_expired(Utc::now() - Duration::hours(24)).await.unwrap();
        assert_eq!(purged, 1);
    }

    #[tokio::test]
    async fn conversations_sorted_by_recency() {
        let store = store();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let ab = send(&store, a, b, "hi b").await;
        let ac = send(&store, a, c, "hi c").await;
        store.touch_conversation(ac.conversation_id, "hi c", a).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.touch_conversation(ab.conversation_id, "again b", a).await.unwrap();

        let list = store.conversations_for(a).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, ab.conversation_id);
        assert_eq!(list[0].last_message, "again b");
        assert_eq!(list[0].last_sender, Some(a));

        assert_eq!(store.conversations_for(c).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn message_requires_existing_conversation() {
        let result = store()
            .create_message(NewMessage {
                conversation_id: Uuid::new_v4(),
                sender: Uuid::new_v4(),
                receiver: Uuid::new_v4(),
                text: "orphan".to_string(),
            })
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn find_users_includes_inactive_accounts() {
        let account = |name: &str, is_active| AdminUser {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name),
            role: "super_admin".to_string(),
            color: "#3B82F6".to_string(),
            is_active,
        };
        let (active, retired) = (account("asha", true), account("ben", false));
        let store = MemoryChatStore::with_users(Duration::hours(24), vec![active.clone(), retired.clone()]);

        let found = store.find_users(&[retired.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(found, vec![retired]);
        assert_eq!(store.active_users().await.unwrap(), vec![active]);
    }

    #[tokio::test]
    async fn reads_survive_an_unbounded_ttl() {
        let store = MemoryChatStore::new(Duration::MAX);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let message = send(&store, a, b, "kept").await;

        assert_eq!(store.messages_in(message.conversation_id).await.unwrap().len(), 1);
        assert_eq!(store.unread_counts(b).await.unwrap().len(), 1);
    }
}
