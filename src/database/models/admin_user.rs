use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Public projection of an admin account, as listed to chat clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub color: String,
    #[serde(skip_serializing)]
    pub is_active: bool,
}
