use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use murmur_db::models::CommentRow;
use murmur_types::api::CreateCommentRequest;
use murmur_types::events::RoomEvent;
use murmur_types::thread::build_threads;

use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::session::Session;
use crate::state::{AppState, run_db};
use crate::validate::{self, COMMENT_MAX};

/// GET /rooms/{code}/posts/{post_id}/comments: threaded, one level deep.
pub async fn list_comments(
    State(state): State<AppState>,
    Path((code, post_id)): Path<(String, Uuid)>,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let room = session.room(&state, &code).await?;

    let pid = post_id.to_string();
    let rows = run_db(&state, move |db| {
        if db.get_post(&room.id, &pid)?.is_none() {
            return Ok(None);
        }
        db.list_comments(&pid).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("post"))?;

    let threads = build_threads(rows.iter().map(|r| r.to_comment()).collect());
    Ok(Json(threads))
}

/// POST /rooms/{code}/posts/{post_id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    Path((code, post_id)): Path<(String, Uuid)>,
    session: Session,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let room = session.room(&state, &code).await?;
    session.ensure_not_banned(&state, &room.id).await?;

    let content = validate::text("content", &req.content, COMMENT_MAX)?;
    let author_name = session.name().to_string();
    let room_id = room.id.clone();
    let pid = post_id.to_string();

    let row = run_db(&state, move |db| {
        if db.get_post(&room_id, &pid)?.is_none() {
            return Ok(Err(ApiError::NotFound("post")));
        }

        // Replies to replies hang off the root so threads stay one level deep.
        // A deleted root no longer heads the thread; its replies do.
        let parent_id = match req.parent_id {
            None => None,
            Some(parent) => match db.get_comment(&room_id, &parent.to_string())? {
                Some(p) if p.post_id == pid => {
                    let live_root = match &p.parent_id {
                        Some(root) => db.get_comment(&room_id, root)?.map(|r| r.id),
                        None => None,
                    };
                    Some(live_root.unwrap_or(p.id))
                }
                _ => {
                    return Ok(Err(ApiError::validation(
                        "parent_id must be a comment on the same post",
                    )));
                }
            },
        };

        let row = CommentRow {
            id: Uuid::new_v4().to_string(),
            post_id: pid,
            parent_id,
            author_name,
            content,
            deleted_at: None,
            created_at: Utc::now(),
        };
        db.insert_comment(&row)?;
        Ok(Ok(row))
    })
    .await??;

    let comment = row.to_comment();
    info!("{} commented {} on post {} in room {}", session.name(), comment.id, post_id, room.code);
    state.dispatcher.publish(
        session.0.sub,
        RoomEvent::CommentCreated {
            comment: comment.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /rooms/{code}/comments/{comment_id}
pub async fn delete_comment(
    State(state): State<AppState>,
    Path((code, comment_id)): Path<(String, Uuid)>,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let room = session.room(&state, &code).await?;
    session.ensure_not_banned(&state, &room.id).await?;

    let room_id = room.id.clone();
    let cid = comment_id.to_string();
    let comment = run_db(&state, move |db| db.get_comment(&room_id, &cid))
        .await?
        .ok_or(ApiError::NotFound("comment"))?
        .to_comment();

    if !session.can_moderate(&comment.author_name) {
        return Err(ApiError::Forbidden("only the author or the room owner can delete this comment"));
    }

    let cid = comment_id.to_string();
    if !run_db(&state, move |db| db.soft_delete_comment(&cid, Utc::now())).await? {
        return Err(ApiError::NotFound("comment"));
    }

    info!("{} deleted comment {} in room {}", session.name(), comment_id, room.code);
    state.dispatcher.publish(
        session.0.sub,
        RoomEvent::CommentDeleted {
            comment_id,
            post_id: comment.post_id,
        },
    );

    Ok(StatusCode::NO_CONTENT)
}
