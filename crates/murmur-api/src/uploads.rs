use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use murmur_db::models::UploadRow;

use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::session::Session;
use crate::state::{AppState, run_db};

/// POST /rooms/{code}/uploads: raw body, type taken from `Content-Type`.
pub async fn upload_media(
    State(state): State<AppState>,
    Path(code): Path<String>,
    session: Session,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let room = session.room(&state, &code).await?;
    session.ensure_not_banned(&state, &room.id).await?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let mime_type = state.media_policy.check(content_type, bytes.len())?;

    let id = Uuid::new_v4().to_string();
    state.storage.write_file(&id, &bytes).await.map_err(|e| {
        error!("Failed to write media file {}: {}", id, e);
        ApiError::Internal(e)
    })?;

    let row = UploadRow {
        url: format!("/media/{}", id),
        id: id.clone(),
        room_id: room.id.clone(),
        uploader_name: session.name().to_string(),
        mime_type,
        size_bytes: bytes.len() as i64,
        created_at: Utc::now(),
    };

    let upload = match run_db(&state, move |db| {
        db.insert_upload(&row)?;
        Ok(row.to_upload())
    })
    .await
    {
        Ok(upload) => upload,
        Err(e) => {
            // don't leave an orphaned file behind
            state.storage.delete_file(&id).await.ok();
            return Err(e);
        }
    };

    info!(
        "{} uploaded {} ({}, {} bytes) to room {}",
        session.name(),
        upload.id,
        upload.mime_type,
        upload.size_bytes,
        room.code
    );

    Ok((StatusCode::CREATED, Json(upload)))
}

/// GET /media/{id}: the bucket is public, no session needed.
pub async fn serve_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let lookup = id.to_string();
    let upload = run_db(&state, move |db| db.get_upload(&lookup, Utc::now()))
        .await?
        .ok_or(ApiError::NotFound("media"))?;

    let bytes = state.storage.read_file(&upload.id).await.map_err(|e| {
        error!("Media file {} missing from storage: {}", upload.id, e);
        ApiError::NotFound("media")
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, upload.mime_type),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        bytes,
    ))
}
