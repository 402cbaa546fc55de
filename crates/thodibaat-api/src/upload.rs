use axum::Json;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use tracing::error;
use uuid::Uuid;

use thodibaat_types::api::UploadResponse;

use crate::AppState;
use crate::error::ApiError;
use crate::extractors::CurrentUser;

/// POST /api/v1/upload — multipart form with a `file` field. The blob
/// lands under the configured upload dir and the response carries a
/// relative URL the client can embed in a message `fileUrl`.
pub async fn upload(
    State(state): State<AppState>,
    _user: CurrentUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Malformed multipart body".into()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or("file").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = field
            .bytes()
            .await
            .map_err(|_| ApiError::BadRequest("Malformed multipart body".into()))?;
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("No file uploaded".into()));
        }

        let filename = format!("{}-{}", Uuid::new_v4(), sanitize(&original_name));

        tokio::fs::create_dir_all(&state.upload_dir)
            .await
            .map_err(|e| {
                error!("Failed to create upload dir: {}", e);
                anyhow::anyhow!(e)
            })?;
        tokio::fs::write(state.upload_dir.join(&filename), &bytes)
            .await
            .map_err(|e| {
                error!("Failed to write upload {}: {}", filename, e);
                anyhow::anyhow!(e)
            })?;

        return Ok(Json(UploadResponse {
            url: format!("/uploads/{}", filename),
            kind: content_type,
        }));
    }

    Err(ApiError::BadRequest("No file uploaded".into()))
}

/// Strip anything outside `[A-Za-z0-9.-]` so the name is safe on disk.
fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-')
        .collect()
}
