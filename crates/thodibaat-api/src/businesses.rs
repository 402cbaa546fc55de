use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use uuid::Uuid;

use thodibaat_db::models::BusinessRow;
use thodibaat_db::now_rfc3339;
use thodibaat_types::api::{
    BusinessInfo, BusinessListResponse, CreateBusinessRequest, CreateBusinessResponse,
    ListBusinessesQuery,
};

use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::{AppState, run_blocking};

/// GET /api/v1/businesses — public directory of approved listings.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListBusinessesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |state| {
        let rows = state
            .db
            .list_approved_businesses(query.category.as_deref(), query.search.as_deref())?;

        Ok(Json(BusinessListResponse {
            businesses: rows.into_iter().map(to_info).collect(),
        }))
    })
    .await
}

/// POST /api/v1/businesses — submit a listing. Anyone authenticated may
/// submit; new listings stay `pending` until approved out of band.
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateBusinessRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (name, category, description, contact) =
        match (req.name, req.category, req.description, req.contact) {
            (Some(n), Some(c), Some(d), Some(ct))
                if !n.is_empty() && !c.is_empty() && !d.is_empty() =>
            {
                (n, c, d, ct)
            }
            _ => return Err(ApiError::BadRequest("Missing required fields".into())),
        };

    let products = req.products.unwrap_or_else(|| json!([]));
    let logo = req.logo;

    run_blocking(&state, move |state| {
        let id = Uuid::new_v4().to_string();
        state.db.create_business(
            &id,
            &user.id,
            &name,
            &category,
            &description,
            &contact.to_string(),
            &products.to_string(),
            logo.as_deref(),
            &now_rfc3339(),
        )?;

        let row = state
            .db
            .get_business(&id)?
            .ok_or_else(|| anyhow::anyhow!("business {} vanished after insert", id))?;

        Ok((
            StatusCode::CREATED,
            Json(CreateBusinessResponse {
                message: "Business listing submitted successfully".into(),
                business: to_info(row),
            }),
        ))
    })
    .await
}

fn to_info(row: BusinessRow) -> BusinessInfo {
    BusinessInfo {
        id: row.id,
        user_id: row.user_id,
        name: row.name,
        category: row.category,
        description: row.description,
        contact: serde_json::from_str(&row.contact).unwrap_or_else(|_| json!({})),
        products: serde_json::from_str(&row.products).unwrap_or_else(|_| json!([])),
        logo: row.logo,
        status: row.status,
        created_at: row.created_at,
    }
}
