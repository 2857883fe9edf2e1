use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted audit record, as pushed in `NEW_AUDIT_LOG` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub user_email: String,
    pub role: String,
    pub action: String,
    pub target: String,
    pub details: Value,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditLog {
    pub user_email: String,
    pub role: String,
    pub action: String,
    pub target: String,
    pub details: Value,
    pub ip_address: String,
    pub user_agent: String,
}

impl NewAuditLog {
    pub fn into_record(self, now: DateTime<Utc>) -> AuditLog {
        AuditLog {
            id: Uuid::new_v4(),
            user_email: self.user_email,
            role: self.role,
            action: self.action,
            target: self.target,
            details: self.details,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: now,
            updated_at: now,
        }
    }
}
