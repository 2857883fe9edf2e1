use std::sync::Arc;
use tracing::debug;

use crate::database::models::AuditLog;
use crate::realtime::presence::PresenceRegistry;
use crate::realtime::protocol::ServerEvent;

/// Entry point for the HTTP side to push an already-persisted audit record
/// to every connected admin as `NEW_AUDIT_LOG`.
#[derive(Debug, Clone)]
pub struct AuditHook {
    presence: Arc<PresenceRegistry>,
}

impl AuditHook {
    pub fn new(presence: Arc<PresenceRegistry>) -> Self {
        Self { presence }
    }

    /// Fire and forget. Never fails, including when nobody is connected.
    pub fn publish(&self, record: &AuditLog) -> usize {
        let delivered = self.presence.broadcast_all(&ServerEvent::NewAuditLog(record.clone()));
        debug!(audit_id = %record.id, action = %record.action, delivered, "audit record pushed");
        delivered
    }
}
