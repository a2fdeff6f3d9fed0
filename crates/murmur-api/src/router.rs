use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
};
use serde_json::{Value, json};

use crate::state::AppState;
use crate::{comments, live, moderation, posts, rooms, uploads};

/// Headroom over the media limit so oversized uploads reach the policy check
/// and get a proper 413 body instead of a bare rejection.
const BODY_SLACK_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = state.media_policy.max_bytes + BODY_SLACK_BYTES;

    Router::new()
        .route("/health", get(health))
        // Rooms
        .route("/rooms", post(rooms::create_room))
        .route(
            "/rooms/{code}",
            get(rooms::preview_room)
                .patch(rooms::update_room)
                .delete(rooms::delete_room),
        )
        .route("/rooms/{code}/join", post(rooms::join_room))
        // Posts
        .route("/rooms/{code}/posts", get(posts::list_posts).post(posts::create_post))
        .route("/rooms/{code}/posts/{post_id}", delete(posts::delete_post))
        .route("/rooms/{code}/posts/{post_id}/pin", post(posts::pin_post))
        // Comments
        .route(
            "/rooms/{code}/posts/{post_id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/rooms/{code}/comments/{comment_id}", delete(comments::delete_comment))
        // Moderation
        .route("/rooms/{code}/bans", get(moderation::list_bans).post(moderation::create_ban))
        .route("/rooms/{code}/bans/{display_name}", delete(moderation::delete_ban))
        .route(
            "/rooms/{code}/reports",
            get(moderation::list_reports).post(moderation::create_report),
        )
        .route("/rooms/{code}/reports/{report_id}", patch(moderation::update_report))
        // Media
        .route("/rooms/{code}/uploads", post(uploads::upload_media))
        .route("/media/{id}", get(uploads::serve_media))
        // Realtime
        .route("/rooms/{code}/live", get(live::live))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
