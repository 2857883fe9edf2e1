use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{DatabaseConfig, RealtimeConfig};
use crate::database::memory::MemoryChatStore;
use crate::database::postgres::PgChatStore;
use crate::database::store::{ChatStore, StoreError};

/// Opens the configured chat store
pub struct DatabaseManager;

impl DatabaseManager {
    /// Postgres when a URL is configured, otherwise the in-memory store.
    pub async fn open_store(
        database: &DatabaseConfig,
        realtime: &RealtimeConfig,
    ) -> Result<Arc<dyn ChatStore>, StoreError> {
        let ttl = realtime.message_ttl();

        match database.url.as_deref() {
            Some(url) => {
                let pool = Self::connect(url, database).await?;
                let store = PgChatStore::new(pool, ttl);
                store.ensure_schema().await?;
                info!("Using Postgres chat store at {}", Self::redact_url(url));
                Ok(Arc::new(store))
            }
            None => {
                warn!("DATABASE_URL not set; chat data is kept in memory and lost on restart");
                Ok(Arc::new(MemoryChatStore::new(ttl)))
            }
        }
    }

    /// Create a connection pool with the configured limits
    pub async fn connect(url: &str, database: &DatabaseConfig) -> Result<PgPool, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(database.max_connections)
            .acquire_timeout(Duration::from_secs(database.connection_timeout))
            .connect(url)
            .await?;

        info!("Created database pool (max {} connections)", database.max_connections);
        Ok(pool)
    }

    /// Strip credentials so the URL can be logged
    pub fn redact_url(raw: &str) -> String {
        match url::Url::parse(raw) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.into()
            }
            Err(_) => "<invalid database url>".to_string(),
        }
    }
}
