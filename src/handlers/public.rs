use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - service descriptor
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Admin Realtime",
            "version": version,
            "description": "Presence, chat and audit fan-out for the admin console",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "socket": "/ws (AUTH frame required)",
                "chat": "/api/chat/users, /api/chat/conversations, /api/chat/unread, /api/chat/messages/:conversationId (protected)",
                "audit": "/api/audit/ui (protected)",
            }
        }
    }))
}

/// GET /health - store connectivity and live socket counts
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let connections = state.presence.connection_count();
    let online_users = state.presence.online_users().len();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok",
                    "connections": connections,
                    "onlineUsers": online_users
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
