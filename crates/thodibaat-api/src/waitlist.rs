use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use thodibaat_db::now_rfc3339;
use thodibaat_types::api::{JoinWaitlistRequest, JoinWaitlistResponse, WaitlistEntryInfo};

use crate::error::ApiError;
use crate::{AppState, run_blocking};

/// POST /api/v1/waitlist — public capture form. One entry per email.
pub async fn join(
    State(state): State<AppState>,
    Json(req): Json<JoinWaitlistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email is required".into()))?;

    run_blocking(&state, move |state| {
        if state.db.find_waitlist_entry(&email)?.is_some() {
            return Err(ApiError::Conflict("You are already on the waitlist!".into()));
        }

        let id = Uuid::new_v4().to_string();
        state.db.insert_waitlist_entry(
            &id,
            &email,
            req.business_name.as_deref(),
            req.category.as_deref(),
            &now_rfc3339(),
        )?;

        let row = state
            .db
            .find_waitlist_entry(&email)?
            .ok_or_else(|| anyhow::anyhow!("waitlist entry {} vanished after insert", id))?;

        Ok((
            StatusCode::CREATED,
            Json(JoinWaitlistResponse {
                message: "Successfully joined the waitlist!".into(),
                entry: WaitlistEntryInfo {
                    id: row.id,
                    email: row.email,
                    business_name: row.business_name,
                    category: row.category,
                    status: row.status,
                    created_at: row.created_at,
                },
            }),
        ))
    })
    .await
}
