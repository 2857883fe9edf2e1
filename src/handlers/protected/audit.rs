use axum::{
    extract::State,
    http::{header, HeaderMap},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ClientInfo;

#[derive(Debug, Deserialize)]
pub struct UiAuditRequest {
    pub action: Option<String>,
    pub target: Option<String>,
    pub details: Option<Value>,
}

/// POST /api/audit/ui - record a front-end-only action
///
/// The record is persisted and pushed to every connected admin as
/// `NEW_AUDIT_LOG`.
pub async fn ui_action(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    Json(body): Json<UiAuditRequest>,
) -> ApiResult<Value> {
    let action = body
        .action
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Action is required"))?;
    let target = body.target.unwrap_or_else(|| "UI".to_string());

    let saved = state
        .audit
        .log_action(
            Some(&user),
            &action,
            &target,
            body.details.unwrap_or_else(|| json!({})),
            client_info(&headers),
        )
        .await;

    Ok(ApiResponse::created(json!({ "logged": saved.is_some() })))
}

fn client_info(headers: &HeaderMap) -> ClientInfo {
    let text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    ClientInfo {
        ip_address: text(header::HeaderName::from_static("x-forwarded-for")),
        user_agent: text(header::USER_AGENT),
    }
}
