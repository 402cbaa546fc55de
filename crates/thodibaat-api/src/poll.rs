use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use thodibaat_db::now_rfc3339;
use thodibaat_types::api::{
    ConversationPollResponse, GlobalPollResponse, ParticipantStatus, PollQuery,
};

use crate::conversations::summarize;
use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::messages::{canonicalize, to_response};
use crate::{AppState, run_blocking};

/// GET /api/v1/conversations/:id/poll?since= — the per-conversation delta.
/// Clients call this every 2-3 seconds and feed the returned `serverTime`
/// back as the next `since` cursor. The window is defined by creation and
/// update time, so a missed cycle loses nothing.
pub async fn conversation_poll(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<PollQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let since = required_since(query)?;

    run_blocking(&state, move |state| {
        if !state.db.is_participant(&id, &user.id)? {
            return Err(ApiError::NotFound("Conversation not found".into()));
        }

        let new_messages = state
            .db
            .messages_created_since(&id, &since)?
            .into_iter()
            .map(to_response)
            .collect();
        let updated_messages = state
            .db
            .messages_updated_since(&id, &since)?
            .into_iter()
            .map(to_response)
            .collect();

        // Polling doubles as a presence heartbeat
        let server_time = now_rfc3339();
        state.db.set_presence(&user.id, true, &server_time)?;

        let participant_statuses = state
            .db
            .participants(&id)?
            .into_iter()
            .filter(|p| p.id != user.id)
            .map(|p| ParticipantStatus {
                user_id: p.id,
                name: p.name,
                is_online: p.is_online,
                last_seen: p.last_seen,
            })
            .collect();

        Ok(Json(ConversationPollResponse {
            new_messages,
            updated_messages,
            participant_statuses,
            server_time,
        }))
    })
    .await
}

/// GET /api/v1/conversations/poll?since= — the list-level delta:
/// conversations touched after the cursor, enriched like the full listing,
/// plus the total unread badge.
pub async fn global_poll(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PollQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let since = required_since(query)?;

    run_blocking(&state, move |state| {
        let updated_conversations = state
            .db
            .conversations_updated_since(&user.id, &since)?
            .into_iter()
            .map(|row| summarize(&state, row, &user.id))
            .collect::<Result<Vec<_>, _>>()?;

        let total_unread_count = state.db.total_unread(&user.id)?;

        let server_time = now_rfc3339();
        state.db.set_presence(&user.id, true, &server_time)?;

        Ok(Json(GlobalPollResponse {
            updated_conversations,
            total_unread_count,
            server_time,
        }))
    })
    .await
}

fn required_since(query: PollQuery) -> Result<String, ApiError> {
    let since = query.since.filter(|s| !s.is_empty()).ok_or_else(|| {
        ApiError::BadRequest("since parameter is required (ISO timestamp)".into())
    })?;
    canonicalize(&since)
}
