use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::database::store::{ChatStore, StoreError};

/// Delete every message older than `ttl`. Returns how many were removed.
pub async fn purge_once(store: &dyn ChatStore, ttl: chrono::Duration) -> Result<u64, StoreError> {
    let cutoff = Utc::now().checked_sub_signed(ttl).unwrap_or(DateTime::<Utc>::MIN_UTC);
    store.purge_expired(cutoff).await
}

/// Periodically hard-delete expired messages until the task is aborted.
pub fn spawn_retention_sweep(store: Arc<dyn ChatStore>, ttl: chrono::Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match purge_once(store.as_ref(), ttl).await {
                Ok(0) => debug!("retention sweep: nothing expired"),
                Ok(purged) => info!(purged, "retention sweep removed expired messages"),
                Err(e) => warn!("retention sweep failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryChatStore;
    use crate::database::models::{NewMessage, ParticipantPair};
    use uuid::Uuid;

    #[tokio::test]
    async fn fresh_messages_survive_a_sweep() {
        let store = MemoryChatStore::new(chrono::Duration::hours(24));
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = store.find_or_create_conversation(ParticipantPair::new(a, b)).await.unwrap();
        store
            .create_message(NewMessage {
                conversation_id: conversation.id,
                sender: a,
                receiver: b,
                text: "still here".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(purge_once(&store, chrono::Duration::hours(24)).await.unwrap(), 0);
        // a zero TTL expires everything created up to now
        assert_eq!(purge_once(&store, chrono::Duration::zero()).await.unwrap(), 1);
    }
}
