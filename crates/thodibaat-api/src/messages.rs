use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use thodibaat_db::models::MessageRow;
use thodibaat_db::{DELETED_PLACEHOLDER, now_rfc3339};
use thodibaat_types::api::{
    EditMessageRequest, ListMessagesQuery, MarkReadResponse, MessageListResponse, MessageResponse,
    MessageSender, Pagination, SendMessageRequest,
};

use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::{AppState, run_blocking};

/// GET /api/v1/conversations/:id/messages — paginated history. Fetched
/// newest-first for stable pagination, then reversed so the page reads
/// oldest-first.
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let offset = (page as u64 - 1) * limit as u64;

    let before = query.before.as_deref().map(canonicalize).transpose()?;
    let after = query.after.as_deref().map(canonicalize).transpose()?;

    run_blocking(&state, move |state| {
        require_participant(&state, &id, &user.id)?;

        let (rows, total) = state.db.list_messages(
            &id,
            before.as_deref(),
            after.as_deref(),
            limit,
            offset,
        )?;

        let mut messages: Vec<MessageResponse> = rows.into_iter().map(to_response).collect();
        messages.reverse();

        Ok(Json(MessageListResponse {
            messages,
            pagination: Pagination::new(page, limit, total),
        }))
    })
    .await
}

/// POST /api/v1/conversations/:id/messages — send. The insert, the
/// conversation-cache refresh and the sender presence bump share one
/// transaction.
pub async fn send(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |state| {
        let conversation = state
            .db
            .get_conversation(&id)?
            .ok_or_else(|| ApiError::NotFound("Conversation not found or access denied".into()))?;
        require_participant(&state, &id, &user.id)?;

        // Block check applies to 1:1 threads only
        if !conversation.is_group {
            let participants = state.db.participants(&id)?;
            if let Some(other) = participants.iter().find(|p| p.id != user.id) {
                if state.db.is_blocked_between(&user.id, &other.id)? {
                    return Err(ApiError::Forbidden(
                        "Cannot send message to this user".into(),
                    ));
                }
            }
        }

        let content = req.content.filter(|c| !c.is_empty());
        let file_url = req.file_url.filter(|f| !f.is_empty());
        if content.is_none() && file_url.is_none() {
            return Err(ApiError::BadRequest(
                "Message content or file is required".into(),
            ));
        }

        if let Some(reply_to_id) = &req.reply_to_id {
            if state.db.get_message(&id, reply_to_id)?.is_none() {
                return Err(ApiError::BadRequest(
                    "Reply message not found in this conversation".into(),
                ));
            }
        }

        let kind = req.kind.unwrap_or_else(|| "text".to_string());
        let content = content.unwrap_or_else(|| file_placeholder(&kind).to_string());

        let message_id = Uuid::new_v4().to_string();
        state.db.send_message(
            &message_id,
            &id,
            &user.id,
            &content,
            &kind,
            file_url.as_deref(),
            req.reply_to_id.as_deref(),
            &now_rfc3339(),
        )?;

        let row = state
            .db
            .get_message(&id, &message_id)?
            .ok_or_else(|| anyhow::anyhow!("message {} vanished after insert", message_id))?;

        Ok((StatusCode::CREATED, Json(to_response(row))))
    })
    .await
}

/// PATCH /api/v1/conversations/:id/messages — mark everything unread from
/// other senders as read by the caller. Idempotent.
pub async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |state| {
        require_participant(&state, &id, &user.id)?;

        let count = state.db.mark_read(&id, &user.id, &now_rfc3339())?;

        Ok(Json(MarkReadResponse {
            message: "Messages marked as read".into(),
            count,
        }))
    })
    .await
}

/// PATCH /api/v1/conversations/:id/messages/:message_id — edit. Sender
/// only, un-deleted only, and only within 15 minutes of creation.
pub async fn edit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, message_id)): Path<(String, String)>,
    Json(req): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |state| {
        let row = state
            .db
            .get_message(&id, &message_id)?
            .filter(|m| m.sender_id == user.id && !m.is_deleted)
            .ok_or_else(|| ApiError::NotFound("Message not found or you cannot edit it".into()))?;

        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| anyhow::anyhow!("corrupt created_at on message {}: {}", row.id, e))?
            .with_timezone(&Utc);
        if Utc::now() - created_at > Duration::minutes(15) {
            return Err(ApiError::BadRequest(
                "Cannot edit messages older than 15 minutes".into(),
            ));
        }

        let content = req
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Content is required".into()))?;

        state.db.edit_message(&message_id, &content, &now_rfc3339())?;

        let row = state
            .db
            .get_message(&id, &message_id)?
            .ok_or_else(|| anyhow::anyhow!("message {} vanished after edit", message_id))?;

        Ok(Json(to_response(row)))
    })
    .await
}

/// DELETE /api/v1/conversations/:id/messages/:message_id — soft delete by
/// the sender. The row survives; content and file are redacted for
/// everyone from here on.
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, message_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |state| {
        let row = state
            .db
            .get_message(&id, &message_id)?
            .filter(|m| m.sender_id == user.id)
            .ok_or_else(|| ApiError::NotFound("Message not found or you cannot delete it".into()))?;

        state.db.soft_delete_message(&row.id, &now_rfc3339())?;

        Ok(Json(json!({ "message": "Message deleted", "id": row.id })))
    })
    .await
}

pub(crate) fn require_participant(
    state: &AppState,
    conversation_id: &str,
    user_id: &str,
) -> Result<(), ApiError> {
    if !state.db.is_participant(conversation_id, user_id)? {
        return Err(ApiError::NotFound(
            "Conversation not found or access denied".into(),
        ));
    }
    Ok(())
}

fn file_placeholder(kind: &str) -> &'static str {
    match kind {
        "image" => "\u{1F4F7} Image",
        "audio" => "\u{1F3B5} Audio",
        "video" => "\u{1F4F9} Video",
        _ => "\u{1F4CE} File",
    }
}

/// Normalize a client-supplied timestamp to the stored format so string
/// comparison in SQL stays chronological.
pub(crate) fn canonicalize(ts: &str) -> Result<String, ApiError> {
    let parsed = DateTime::parse_from_rfc3339(ts)
        .map_err(|_| ApiError::BadRequest(format!("Invalid timestamp: {}", ts)))?;
    Ok(parsed
        .with_timezone(&Utc)
        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
}

/// Row -> wire shape. Deleted messages are redacted at the source when the
/// flag flips, and again here in case an older row predates that.
pub(crate) fn to_response(row: MessageRow) -> MessageResponse {
    let read_by = row.read_by_list();
    MessageResponse {
        id: row.id,
        conversation_id: row.conversation_id,
        sender_id: row.sender_id.clone(),
        sender: MessageSender {
            id: row.sender_id,
            name: row.sender_name,
            avatar: row.sender_avatar,
        },
        content: if row.is_deleted {
            DELETED_PLACEHOLDER.to_string()
        } else {
            row.content
        },
        kind: row.kind,
        file_url: if row.is_deleted { None } else { row.file_url },
        reply_to_id: row.reply_to_id,
        read_by,
        is_deleted: row.is_deleted,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}
