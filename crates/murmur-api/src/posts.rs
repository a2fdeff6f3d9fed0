use std::collections::HashSet;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use murmur_db::Database;
use murmur_db::models::{PostCursor, PostRow};
use murmur_types::api::{CreatePostRequest, PinPostRequest};
use murmur_types::events::RoomEvent;
use murmur_types::models::Post;

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::session::Session;
use crate::state::{AppState, run_db};
use crate::validate::{self, MEDIA_PER_POST, POST_MAX};

#[derive(Debug, Deserialize)]
pub struct PostQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor: `created_at` of the oldest unpinned post on the previous page.
    pub before: Option<DateTime<Utc>>,
    /// Id of that post, so posts sharing its timestamp are not skipped.
    pub before_id: Option<Uuid>,
}

fn default_limit() -> u32 {
    50
}

/// Resolve media for a batch of post rows with a single upload query.
fn hydrate(db: &Database, room_id: &str, rows: &[PostRow]) -> anyhow::Result<Vec<Post>> {
    let ids: Vec<String> = rows
        .iter()
        .flat_map(|r| r.media.iter().cloned())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let uploads = db.get_uploads(room_id, &ids)?;
    Ok(rows.iter().map(|r| r.to_post(&uploads)).collect())
}

/// GET /rooms/{code}/posts
pub async fn list_posts(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<PostQuery>,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let room = session.room(&state, &code).await?;
    let limit = query.limit.clamp(1, 200);
    let cursor = match (query.before, query.before_id) {
        (Some(created_at), id) => Some(PostCursor {
            created_at,
            id: id.map(|id| id.to_string()),
        }),
        (None, Some(_)) => return Err(ApiError::validation("before_id requires before")),
        (None, None) => None,
    };

    let posts = run_db(&state, move |db| {
        let rows = db.list_posts(&room.id, limit, cursor.as_ref())?;
        hydrate(db, &room.id, &rows)
    })
    .await?;

    Ok(Json(posts))
}

/// POST /rooms/{code}/posts
pub async fn create_post(
    State(state): State<AppState>,
    Path(code): Path<String>,
    session: Session,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let room = session.room(&state, &code).await?;
    session.ensure_not_banned(&state, &room.id).await?;

    let content = validate::text("content", &req.content, POST_MAX)?;
    if req.media.len() > MEDIA_PER_POST {
        return Err(ApiError::validation(format!(
            "a post may carry at most {MEDIA_PER_POST} media items"
        )));
    }

    let mut media: Vec<String> = Vec::with_capacity(req.media.len());
    for id in &req.media {
        let id = id.to_string();
        if !media.contains(&id) {
            media.push(id);
        }
    }

    let row = PostRow {
        id: Uuid::new_v4().to_string(),
        room_id: room.id.clone(),
        author_name: session.name().to_string(),
        content,
        media,
        pinned: false,
        deleted_at: None,
        created_at: Utc::now(),
    };

    let post = run_db(&state, move |db| {
        let uploads = db.get_uploads(&row.room_id, &row.media)?;
        if uploads.len() != row.media.len() {
            return Ok(Err(ApiError::validation("media must be uploads of this room")));
        }
        db.insert_post(&row)?;
        Ok(Ok(row.to_post(&uploads)))
    })
    .await??;

    info!("{} posted {} in room {}", session.name(), post.id, room.code);
    state
        .dispatcher
        .publish(post.room_id, RoomEvent::PostCreated { post: post.clone() });

    Ok((StatusCode::CREATED, Json(post)))
}

/// POST /rooms/{code}/posts/{post_id}/pin
pub async fn pin_post(
    State(state): State<AppState>,
    Path((code, post_id)): Path<(String, Uuid)>,
    session: Session,
    Json(req): Json<PinPostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_owner()?;
    let room = session.room(&state, &code).await?;

    let pid = post_id.to_string();
    let post = run_db(&state, move |db| {
        if !db.set_post_pinned(&room.id, &pid, req.pinned)? {
            return Ok(None);
        }
        let rows: Vec<PostRow> = db.get_post(&room.id, &pid)?.into_iter().collect();
        Ok(hydrate(db, &room.id, &rows)?.pop())
    })
    .await?
    .ok_or(ApiError::NotFound("post"))?;

    state
        .dispatcher
        .publish(post.room_id, RoomEvent::PostUpdated { post: post.clone() });

    Ok(Json(post))
}

/// DELETE /rooms/{code}/posts/{post_id}
pub async fn delete_post(
    State(state): State<AppState>,
    Path((code, post_id)): Path<(String, Uuid)>,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let room = session.room(&state, &code).await?;
    session.ensure_not_banned(&state, &room.id).await?;

    let room_id = room.id.clone();
    let pid = post_id.to_string();
    let post = run_db(&state, move |db| db.get_post(&room_id, &pid))
        .await?
        .ok_or(ApiError::NotFound("post"))?;

    if !session.can_moderate(&post.author_name) {
        return Err(ApiError::Forbidden("only the author or the room owner can delete this post"));
    }

    let room_id = room.id.clone();
    let deleted = run_db(&state, move |db| db.soft_delete_post(&room_id, &post.id, Utc::now())).await?;
    if !deleted {
        return Err(ApiError::NotFound("post"));
    }

    info!("{} deleted post {} in room {}", session.name(), post_id, room.code);
    state
        .dispatcher
        .publish(session.0.sub, RoomEvent::PostDeleted { post_id });

    Ok(StatusCode::NO_CONTENT)
}
