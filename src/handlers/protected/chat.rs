use axum::{
    extract::{Path, State},
    Extension,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::database::models::{AdminUser, ConversationSummary, Message, UnreadCount};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/chat/users - active admin users the caller can message
pub async fn users(State(state): State<AppState>) -> ApiResult<Vec<AdminUser>> {
    let users = state.store.active_users().await?;
    Ok(ApiResponse::success(users))
}

/// GET /api/chat/conversations - caller's conversations, most recent first,
/// with each participant's name, role and color filled in
pub async fn conversations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<ConversationSummary>> {
    let conversations = state.store.conversations_for(user.user_id).await?;

    let mut ids: Vec<Uuid> = conversations.iter().flat_map(|c| c.participants).collect();
    ids.sort_unstable();
    ids.dedup();
    let users: HashMap<Uuid, AdminUser> = state
        .store
        .find_users(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let summaries = conversations
        .into_iter()
        .map(|c| ConversationSummary::new(c, &users))
        .collect();
    Ok(ApiResponse::success(summaries))
}

/// GET /api/chat/unread - unread message counts grouped by sender
pub async fn unread(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<UnreadCount>> {
    let counts = state.store.unread_counts(user.user_id).await?;
    Ok(ApiResponse::success(counts))
}

/// GET /api/chat/messages/:conversationId - live history, oldest first
pub async fn messages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
) -> ApiResult<Vec<Message>> {
    let conversation_id =
        Uuid::parse_str(&conversation_id).map_err(|_| ApiError::bad_request("Invalid conversation id"))?;

    // Non-participants get the same answer as a missing conversation
    match state.store.find_conversation(conversation_id).await? {
        Some(conversation) if conversation.has_participant(user.user_id) => {}
        _ => return Err(ApiError::not_found("Conversation not found")),
    }

    let messages = state.store.messages_in(conversation_id).await?;
    Ok(ApiResponse::success(messages))
}
