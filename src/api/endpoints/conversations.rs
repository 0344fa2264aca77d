//! Conversation lifecycle endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::chat::{self, ConversationSummary, DeleteOutcome, MessageView};
use crate::db::repository::{
    get_conversation, get_messages, set_active_conversation, update_conversation_title,
};
use crate::models::Conversation;

#[derive(Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
    pub active_conversation_id: Uuid,
}

#[derive(Serialize)]
pub struct ConversationDetail {
    pub conversation: Conversation,
    pub messages: Vec<MessageView>,
}

#[derive(Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Serialize)]
pub struct ActivateResponse {
    pub active_conversation_id: Uuid,
}

/// `GET /api/conversations` — sidebar summaries, newest first.
///
/// Repairs the active-conversation setting on the way, so the list is
/// never empty and the reported active id always exists.
pub async fn list(
    State(ctx): State<ApiContext>,
) -> Result<Json<ConversationListResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let active_conversation_id = chat::ensure_active_conversation(&conn)?;
    let conversations = chat::list_conversation_summaries(&conn)?;
    Ok(Json(ConversationListResponse {
        conversations,
        active_conversation_id,
    }))
}

/// `POST /api/conversations` — start a fresh conversation and make it
/// active. Seeded with the welcome message.
pub async fn create(State(ctx): State<ApiContext>) -> Result<Json<Conversation>, ApiError> {
    let conn = ctx.core.open_db()?;
    let conversation = chat::create_conversation_with_welcome(&conn)?;
    set_active_conversation(&conn, &conversation.id)?;
    tracing::info!(conversation_id = %conversation.id, "Conversation created");
    Ok(Json(conversation))
}

/// `GET /api/conversations/:id` — one conversation with its rendered
/// messages (markers rewritten, citations attached).
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationDetail>, ApiError> {
    let conn = ctx.core.open_db()?;
    let conversation = get_conversation(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Conversation not found: {id}")))?;
    let messages = chat::message_views(get_messages(&conn, &id)?);
    Ok(Json(ConversationDetail {
        conversation,
        messages,
    }))
}

/// `PUT /api/conversations/:id/title` — explicit rename. A renamed
/// conversation is never auto-titled again.
pub async fn rename(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RenameRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Title cannot be empty".into()));
    }

    let conn = ctx.core.open_db()?;
    let mut conversation = get_conversation(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Conversation not found: {id}")))?;
    update_conversation_title(&conn, &id, title)?;
    conversation.title = title.to_string();
    Ok(Json(conversation))
}

/// `PUT /api/conversations/:id/activate` — switch the active conversation.
pub async fn activate(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActivateResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    get_conversation(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Conversation not found: {id}")))?;
    set_active_conversation(&conn, &id)?;
    Ok(Json(ActivateResponse {
        active_conversation_id: id,
    }))
}

/// `DELETE /api/conversations/:id` — delete and report the conversation
/// that is active afterwards. Deleting the last conversation hands back
/// a fresh welcome conversation.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteOutcome>, ApiError> {
    let conn = ctx.core.open_db()?;
    let outcome = chat::delete_conversation_and_promote(&conn, &id)?;
    if !outcome.deleted {
        return Err(ApiError::NotFound(format!("Conversation not found: {id}")));
    }
    Ok(Json(outcome))
}
