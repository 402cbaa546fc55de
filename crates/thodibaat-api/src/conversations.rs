use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use uuid::Uuid;

use thodibaat_db::models::ConversationRow;
use thodibaat_db::{DELETED_PLACEHOLDER, now_rfc3339};
use thodibaat_types::api::{
    ConversationDetail, ConversationListResponse, ConversationSummary, CreateConversationRequest,
    LastMessagePreview, ListConversationsQuery, Pagination, UpdateConversationRequest,
};

use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::users::to_participant;
use crate::{AppState, run_blocking};

/// GET /api/v1/conversations — the caller's conversations, most recent
/// activity first, searchable by group name or participant name.
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListConversationsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 50);
    let offset = (page as u64 - 1) * limit as u64;

    run_blocking(&state, move |state| {
        let (rows, total) =
            state
                .db
                .list_conversations(&user.id, query.search.as_deref(), limit, offset)?;

        let conversations = rows
            .into_iter()
            .map(|row| summarize(&state, row, &user.id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Json(ConversationListResponse {
            conversations,
            pagination: Pagination::new(page, limit, total),
        }))
    })
    .await
}

/// POST /api/v1/conversations — create a group, or find-or-create a 1:1
/// thread.
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateConversationRequest>,
) -> Result<Response, ApiError> {
    run_blocking(&state, move |state| {
        if req.is_group {
            return create_group(&state, &user, req);
        }

        let recipient_id = req
            .recipient_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::BadRequest("recipientId is required".into()))?;

        if recipient_id == user.id {
            return Err(ApiError::BadRequest(
                "Cannot start a conversation with yourself".into(),
            ));
        }

        if state.db.get_user_by_id(&recipient_id)?.is_none() {
            return Err(ApiError::NotFound("Recipient not found".into()));
        }

        if state.db.is_blocked_between(&user.id, &recipient_id)? {
            return Err(ApiError::Forbidden("Cannot message this user".into()));
        }

        let message = req.message.filter(|m| !m.is_empty());

        if let Some(conversation_id) = state.db.find_direct_between(&user.id, &recipient_id)? {
            if let Some(content) = &message {
                state.db.send_message(
                    &Uuid::new_v4().to_string(),
                    &conversation_id,
                    &user.id,
                    content,
                    "text",
                    None,
                    None,
                    &now_rfc3339(),
                )?;
            }
            let row = load(&state, &conversation_id)?;
            return Ok(Json(detail(&state, row, &user.id)?).into_response());
        }

        let conversation_id = Uuid::new_v4().to_string();
        let message_id = Uuid::new_v4().to_string();
        state.db.create_direct_conversation(
            &conversation_id,
            &user.id,
            &recipient_id,
            message.as_deref().map(|content| (message_id.as_str(), content)),
            &now_rfc3339(),
        )?;

        let row = load(&state, &conversation_id)?;
        Ok((StatusCode::CREATED, Json(detail(&state, row, &user.id)?)).into_response())
    })
    .await
}

fn create_group(
    state: &AppState,
    user: &CurrentUser,
    req: CreateConversationRequest,
) -> Result<Response, ApiError> {
    let name = req.name.filter(|n| !n.is_empty());
    let participant_ids = req.participant_ids.filter(|ids| !ids.is_empty());
    let (name, participant_ids) = match (name, participant_ids) {
        (Some(n), Some(ids)) => (n, ids),
        _ => {
            return Err(ApiError::BadRequest(
                "Group name and at least 1 other participant required".into(),
            ));
        }
    };

    // Creator joins and becomes admin; duplicates collapse.
    let mut member_ids = vec![user.id.clone()];
    for id in participant_ids {
        if !member_ids.contains(&id) {
            member_ids.push(id);
        }
    }

    let content = req
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Group \"{}\" created", name));

    let conversation_id = Uuid::new_v4().to_string();
    let message_id = Uuid::new_v4().to_string();
    state.db.create_group_conversation(
        &conversation_id,
        &name,
        &user.id,
        &member_ids,
        (&message_id, &content),
        &now_rfc3339(),
    )?;

    let row = load(state, &conversation_id)?;
    Ok((StatusCode::CREATED, Json(detail(state, row, &user.id)?)).into_response())
}

/// GET /api/v1/conversations/:id
pub async fn get_one(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |state| {
        let row = state
            .db
            .get_conversation(&id)?
            .ok_or_else(|| ApiError::NotFound("Conversation not found".into()))?;

        if !state.db.is_participant(&id, &user.id)? {
            return Err(ApiError::Forbidden("Forbidden".into()));
        }

        Ok(Json(detail(&state, row, &user.id)?))
    })
    .await
}

/// PATCH /api/v1/conversations/:id — group settings, admin only: rename,
/// avatar, add/remove members. The admin cannot be removed.
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |state| {
        let row = state
            .db
            .get_conversation(&id)?
            .ok_or_else(|| ApiError::NotFound("Conversation not found".into()))?;

        if row.is_group && row.admin_id.as_deref() != Some(user.id.as_str()) {
            return Err(ApiError::Forbidden(
                "Only group admin can modify this conversation".into(),
            ));
        }
        if !row.is_group {
            return Err(ApiError::BadRequest(
                "Cannot modify a private conversation".into(),
            ));
        }

        let add_ids = req.add_participant_ids.unwrap_or_default();
        let remove_ids: Vec<String> = req
            .remove_participant_ids
            .unwrap_or_default()
            .into_iter()
            .filter(|pid| Some(pid.as_str()) != row.admin_id.as_deref())
            .collect();

        state.db.update_group(
            &id,
            req.name.as_deref().filter(|n| !n.is_empty()),
            req.group_avatar.as_deref().filter(|a| !a.is_empty()),
            &add_ids,
            &remove_ids,
            &now_rfc3339(),
        )?;

        let row = load(&state, &id)?;
        Ok(Json(detail(&state, row, &user.id)?))
    })
    .await
}

/// DELETE /api/v1/conversations/:id — the group admin deletes the group,
/// a non-admin member leaves, and either 1:1 party deletes the thread.
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |state| {
        let row = state
            .db
            .get_conversation(&id)?
            .ok_or_else(|| ApiError::NotFound("Conversation not found".into()))?;

        if !state.db.is_participant(&id, &user.id)? {
            return Err(ApiError::Forbidden("Forbidden".into()));
        }

        if row.is_group {
            if row.admin_id.as_deref() == Some(user.id.as_str()) {
                state.db.delete_conversation(&id)?;
                Ok(Json(json!({ "message": "Group deleted successfully" })))
            } else {
                state.db.remove_participant(&id, &user.id)?;
                Ok(Json(json!({ "message": "Left group successfully" })))
            }
        } else {
            state.db.delete_conversation(&id)?;
            Ok(Json(json!({ "message": "Conversation deleted successfully" })))
        }
    })
    .await
}

fn load(state: &AppState, id: &str) -> Result<ConversationRow, ApiError> {
    state
        .db
        .get_conversation(id)?
        .ok_or_else(|| anyhow::anyhow!("conversation {} vanished", id).into())
}

pub(crate) fn detail(
    state: &AppState,
    row: ConversationRow,
    user_id: &str,
) -> Result<ConversationDetail, ApiError> {
    let participants: Vec<_> = state
        .db
        .participants(&row.id)?
        .into_iter()
        .map(to_participant)
        .collect();
    let other_participants = participants
        .iter()
        .filter(|p| p.id != user_id)
        .cloned()
        .collect();

    Ok(ConversationDetail {
        id: row.id,
        is_group: row.is_group,
        name: row.name,
        group_avatar: row.group_avatar,
        admin_id: row.admin_id,
        participants,
        other_participants,
        last_message: row.last_message,
        last_message_at: row.last_message_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// The enriched listing/poll entry: participants, redacted last message
/// and the computed unread count.
pub(crate) fn summarize(
    state: &AppState,
    row: ConversationRow,
    user_id: &str,
) -> Result<ConversationSummary, ApiError> {
    let participants: Vec<_> = state
        .db
        .participants(&row.id)?
        .into_iter()
        .map(to_participant)
        .collect();
    let other_participants: Vec<_> = participants
        .iter()
        .filter(|p| p.id != user_id)
        .cloned()
        .collect();

    let name = if row.is_group {
        row.name.clone().unwrap_or_else(|| "Unknown".to_string())
    } else {
        other_participants
            .first()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    };

    let last_message = state.db.last_message(&row.id)?.map(|m| LastMessagePreview {
        id: m.id,
        content: if m.is_deleted {
            DELETED_PLACEHOLDER.to_string()
        } else {
            m.content
        },
        kind: m.kind,
        sender_id: m.sender_id,
        created_at: m.created_at,
        is_deleted: m.is_deleted,
    });

    let unread_count = state.db.unread_count(&row.id, user_id)?;

    Ok(ConversationSummary {
        id: row.id,
        is_group: row.is_group,
        name,
        group_avatar: row.group_avatar,
        admin_id: row.admin_id,
        participants,
        other_participants,
        last_message,
        unread_count,
        last_message_at: row.last_message_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
