use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::error;

use crate::auth::AuthUser;
use crate::database::models::{AuditLog, NewAuditLog};
use crate::database::store::ChatStore;
use crate::realtime::AuditHook;

/// Where a request came from, for the audit trail
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: String,
}

/// Persists audit records and pushes them to connected admins.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn ChatStore>,
    hook: AuditHook,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn ChatStore>, hook: AuditHook) -> Self {
        Self { store, hook }
    }

    /// Record `action` on `target`. Requests without a user are attributed to
    /// the `SYSTEM` actor. Errors are logged, never returned: auditing must
    /// not fail the request that triggered it.
    pub async fn log_action(
        &self,
        actor: Option<&AuthUser>,
        action: &str,
        target: &str,
        details: Value,
        client: ClientInfo,
    ) -> Option<AuditLog> {
        let record = build_record(actor, action, target, details, client);

        match self.store.insert_audit_log(record).await {
            Ok(saved) => {
                self.hook.publish(&saved);
                Some(saved)
            }
            Err(e) => {
                error!(action, target, "Audit log error: {}", e);
                None
            }
        }
    }
}

fn build_record(
    actor: Option<&AuthUser>,
    action: &str,
    target: &str,
    details: Value,
    client: ClientInfo,
) -> NewAuditLog {
    let performed_by = match actor {
        Some(user) => json!({
            "id": user.user_id,
            "name": non_empty(&user.name),
            "email": non_empty(&user.email),
            "role": non_empty(&user.role),
        }),
        None => json!({ "id": null, "name": "System", "email": null, "role": "system" }),
    };

    let mut details = match details {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    details.insert("performedBy".to_string(), performed_by);

    NewAuditLog {
        user_email: actor
            .and_then(|u| non_empty(&u.email))
            .unwrap_or("SYSTEM")
            .to_string(),
        role: actor
            .and_then(|u| non_empty(&u.role))
            .unwrap_or(if actor.is_some() { "public" } else { "system" })
            .to_string(),
        action: action.to_string(),
        target: target.to_string(),
        details: Value::Object(details),
        ip_address: client.ip_address,
        user_agent: client.user_agent,
    }
}

fn non_empty(s: &str) -> Option<&str> {
    Some(s).filter(|s| !s.is_empty())
}
