use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde_json::json;

use thodibaat_db::models::{ParticipantRow, UserRow};
use thodibaat_db::now_rfc3339;
use thodibaat_types::api::{
    ListUsersQuery, Pagination, ParticipantInfo, StatusRequest, StatusResponse, UserListResponse,
    UserProfile,
};

use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::{AppState, run_blocking};

/// GET /api/v1/users — directory search. Excludes the caller and anyone in
/// a block relation with them, in either direction.
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 50);
    let offset = (page as u64 - 1) * limit as u64;

    run_blocking(&state, move |state| {
        let mut exclude = state.db.blocked_ids_for(&user.id)?;
        exclude.push(user.id.clone());

        let (rows, total) = state
            .db
            .search_users(&exclude, query.search.as_deref(), limit, offset)?;

        Ok(Json(UserListResponse {
            users: rows.into_iter().map(to_participant).collect(),
            pagination: Pagination::new(page, limit, total),
        }))
    })
    .await
}

/// GET /api/v1/users/me
pub async fn me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |state| {
        let row = state
            .db
            .get_user_by_id(&user.id)?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

        Ok(Json(json!({ "user": to_profile(row) })))
    })
    .await
}

/// POST /api/v1/users/me/status — presence heartbeat. Clients call this
/// every ~30 seconds while open and once with `isOnline: false` when
/// backgrounded.
pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let is_online = req.is_online.unwrap_or(true);

    run_blocking(&state, move |state| {
        let now = now_rfc3339();
        state.db.set_presence(&user.id, is_online, &now)?;

        Ok(Json(StatusResponse {
            message: "Status updated".into(),
            is_online,
            last_seen: now,
        }))
    })
    .await
}

/// Strip the password hash and lift the stored privacy JSON into the
/// response.
pub(crate) fn to_profile(row: UserRow) -> UserProfile {
    let privacy_settings =
        serde_json::from_str(&row.privacy_settings).unwrap_or_else(|_| json!({}));

    UserProfile {
        id: row.id,
        name: row.name,
        email: row.email,
        avatar: row.avatar,
        bio: row.bio,
        role: row.role,
        is_online: row.is_online,
        last_seen: row.last_seen,
        privacy_settings,
        created_at: row.created_at,
    }
}

pub(crate) fn to_participant(row: ParticipantRow) -> ParticipantInfo {
    ParticipantInfo {
        id: row.id,
        name: row.name,
        email: row.email,
        avatar: row.avatar,
        is_online: row.is_online,
        last_seen: row.last_seen,
    }
}
