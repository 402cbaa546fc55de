use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use thodibaat_db::now_rfc3339;
use thodibaat_types::api::{BlockRequest, BlockedListResponse, BlockedUserInfo};

use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::{AppState, run_blocking};

/// GET /api/v1/users/blocked — users the caller has blocked, newest first.
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |state| {
        let rows = state.db.list_blocked(&user.id)?;

        Ok(Json(BlockedListResponse {
            blocked_users: rows
                .into_iter()
                .map(|row| BlockedUserInfo {
                    id: row.id,
                    name: row.name,
                    email: row.email,
                    avatar: row.avatar,
                    blocked_at: row.blocked_at,
                })
                .collect(),
        }))
    })
    .await
}

/// POST /api/v1/users/blocked — block a user. Blocking in either direction
/// suppresses new conversations and messages between the pair; existing
/// history is untouched.
pub async fn block(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<BlockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target_id = req
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("userId is required".into()))?;

    if target_id == user.id {
        return Err(ApiError::BadRequest("Cannot block yourself".into()));
    }

    run_blocking(&state, move |state| {
        if state.db.is_blocked(&user.id, &target_id)? {
            return Err(ApiError::Conflict("User already blocked".into()));
        }

        state.db.block_user(&user.id, &target_id, &now_rfc3339())?;

        Ok((
            StatusCode::CREATED,
            Json(json!({ "message": "User blocked successfully" })),
        ))
    })
    .await
}

/// DELETE /api/v1/users/blocked — unblock. A direct delete of the block
/// row; unblocking someone who was never blocked is a no-op.
pub async fn unblock(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<BlockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target_id = req
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("userId is required".into()))?;

    run_blocking(&state, move |state| {
        state.db.unblock_user(&user.id, &target_id)?;

        Ok(Json(json!({ "message": "User unblocked successfully" })))
    })
    .await
}
