use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use murmur_api::tokens::hash_owner_token;
use murmur_api::{AppState, AppStateInner, router};
use murmur_db::Database;
use murmur_db::models::RoomRow;
use murmur_gateway::Dispatcher;
use murmur_media::{MediaPolicy, Storage};

const SECRET: &str = "integration-test-secret";

async fn app_with_policy(policy: MediaPolicy) -> (Router, AppState) {
    let dir = std::env::temp_dir().join(format!("murmur-api-test-{}", Uuid::new_v4()));
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        storage: Storage::new(dir).await.unwrap(),
        media_policy: policy,
        dispatcher: Dispatcher::new(),
        session_secret: SECRET.into(),
    });
    (router(state.clone()), state)
}

async fn app() -> (Router, AppState) {
    app_with_policy(MediaPolicy::default()).await
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Creates a room and returns (code, owner_token).
async fn create_room(app: &Router, body: Value) -> (String, String) {
    let (status, body) = send(app, json_request("POST", "/rooms", None, body)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["room"]["code"].as_str().unwrap().to_string(),
        body["owner_token"].as_str().unwrap().to_string(),
    )
}

async fn join(app: &Router, code: &str, body: Value) -> (StatusCode, Value) {
    send(app, json_request("POST", &format!("/rooms/{code}/join"), None, body)).await
}

async fn join_token(app: &Router, code: &str, body: Value) -> String {
    let (status, body) = join(app, code, body).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check() {
    let (app, _) = app().await;
    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_preview_and_join() {
    let (app, _) = app().await;
    let (status, created) = send(
        &app,
        json_request("POST", "/rooms", None, json!({ "title": "Late night thoughts" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let code = created["room"]["code"].as_str().unwrap();
    assert_eq!(code.len(), 8);
    assert_eq!(created["share_code"].as_str().unwrap().replace('-', ""), code);
    assert_eq!(created["room"]["ephemeral"], true);
    assert!(created["room"]["expires_at"].is_string());
    assert!(created["room"].get("owner_token_hash").is_none());

    // Codes are accepted in the pretty, lower-case form too
    let pretty = created["share_code"].as_str().unwrap().to_lowercase();
    let (status, preview) = send(&app, get(&format!("/rooms/{pretty}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["title"], "Late night thoughts");
    assert_eq!(preview["has_password"], false);

    let (status, joined) = join(&app, code, json!({ "display_name": "moth" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["display_name"], "moth");
    assert_eq!(joined["is_owner"], false);
    assert!(joined["token"].is_string());
}

#[tokio::test]
async fn invalid_and_unknown_codes() {
    let (app, _) = app().await;

    let (status, body) = join(&app, "NOPE", json!({ "display_name": "moth" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_code");

    // 'O' and '0' are not in the alphabet
    let (status, _) = send(&app, get("/rooms/O0O0O0O0", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = join(&app, "ABCDEFGH", json!({ "display_name": "moth" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "room_not_found");
}

#[tokio::test]
async fn expired_room_is_gone() {
    let (app, state) = app().await;
    let past = Utc::now() - Duration::hours(1);
    let row = RoomRow {
        id: Uuid::new_v4().to_string(),
        code: "EXPREDZZ".into(),
        title: "old".into(),
        description: None,
        owner_token_hash: hash_owner_token("whatever"),
        password_hash: None,
        ephemeral: true,
        expires_at: Some(past),
        created_at: past - Duration::hours(24),
    };
    assert!(state.db.try_insert_room(&row).unwrap());

    let (status, body) = join(&app, "EXPREDZZ", json!({ "display_name": "moth" })).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "room_expired");

    // Even the owner cannot get back in
    let (status, _) = join(
        &app,
        "EXPREDZZ",
        json!({ "display_name": "host", "owner_token": "whatever" }),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);

    let (status, _) = send(&app, get("/rooms/EXPREDZZ", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn password_and_owner_token() {
    let (app, _) = app().await;
    let (code, owner_token) =
        create_room(&app, json!({ "title": "secret club", "password": "hunter22" })).await;

    let (status, body) = join(&app, &code, json!({ "display_name": "moth" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_password");

    let (status, _) = join(
        &app,
        &code,
        json!({ "display_name": "moth", "password": "hunter2" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = join(
        &app,
        &code,
        json!({ "display_name": "moth", "password": "hunter22" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Owner token skips the password
    let (status, body) = join(
        &app,
        &code,
        json!({ "display_name": "host", "owner_token": owner_token }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_owner"], true);

    let (status, body) = join(
        &app,
        &code,
        json!({ "display_name": "host", "owner_token": "not-the-token" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "invalid_owner_token");
}

#[tokio::test]
async fn routes_require_a_session() {
    let (app, _) = app().await;
    let (code, _) = create_room(&app, json!({ "title": "room" })).await;

    let (status, body) = send(&app, get(&format!("/rooms/{code}/posts"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(&app, get(&format!("/rooms/{code}/posts"), Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A session for one room does not open another
    let (other, _) = create_room(&app, json!({ "title": "other" })).await;
    let token = join_token(&app, &other, json!({ "display_name": "moth" })).await;
    let (status, _) = send(&app, get(&format!("/rooms/{code}/posts"), Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn posts_pins_and_deletes() {
    let (app, _) = app().await;
    let (code, owner_token) = create_room(&app, json!({ "title": "room" })).await;
    let owner = join_token(
        &app,
        &code,
        json!({ "display_name": "host", "owner_token": owner_token }),
    )
    .await;
    let moth = join_token(&app, &code, json!({ "display_name": "moth" })).await;
    let wren = join_token(&app, &code, json!({ "display_name": "wren" })).await;

    let posts_uri = format!("/rooms/{code}/posts");
    let (status, first) =
        send(&app, json_request("POST", &posts_uri, Some(&moth), json!({ "content": "first" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["author_name"], "moth");
    let first_id = first["id"].as_str().unwrap().to_string();

    let (status, _) =
        send(&app, json_request("POST", &posts_uri, Some(&wren), json!({ "content": "second" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) =
        send(&app, json_request("POST", &posts_uri, Some(&wren), json!({ "content": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Newest first
    let (_, list) = send(&app, get(&posts_uri, Some(&moth))).await;
    assert_eq!(list[0]["content"], "second");
    assert_eq!(list[1]["content"], "first");

    // Only the owner pins
    let pin_uri = format!("/rooms/{code}/posts/{first_id}/pin");
    let (status, _) =
        send(&app, json_request("POST", &pin_uri, Some(&moth), json!({ "pinned": true }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, pinned) =
        send(&app, json_request("POST", &pin_uri, Some(&owner), json!({ "pinned": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pinned["pinned"], true);

    let (_, list) = send(&app, get(&posts_uri, Some(&moth))).await;
    assert_eq!(list[0]["id"], first_id.as_str());

    // Someone else's post cannot be deleted, your own can
    let delete_uri = format!("/rooms/{code}/posts/{first_id}");
    let (status, _) = send(&app, json_request("DELETE", &delete_uri, Some(&wren), json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, json_request("DELETE", &delete_uri, Some(&moth), json!({}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, json_request("DELETE", &delete_uri, Some(&moth), json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, get(&posts_uri, Some(&moth))).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn comments_are_threaded_one_level() {
    let (app, _) = app().await;
    let (code, _) = create_room(&app, json!({ "title": "room" })).await;
    let moth = join_token(&app, &code, json!({ "display_name": "moth" })).await;

    let (_, post) = send(
        &app,
        json_request("POST", &format!("/rooms/{code}/posts"), Some(&moth), json!({ "content": "hi" })),
    )
    .await;
    let post_id = post["id"].as_str().unwrap();
    let comments_uri = format!("/rooms/{code}/posts/{post_id}/comments");

    let (status, root) =
        send(&app, json_request("POST", &comments_uri, Some(&moth), json!({ "content": "root" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let root_id = root["id"].as_str().unwrap();

    let (_, reply) = send(
        &app,
        json_request(
            "POST",
            &comments_uri,
            Some(&moth),
            json!({ "content": "reply", "parent_id": root_id }),
        ),
    )
    .await;
    assert_eq!(reply["parent_id"], root_id);

    // A reply to a reply is attached to the root
    let (_, nested) = send(
        &app,
        json_request(
            "POST",
            &comments_uri,
            Some(&moth),
            json!({ "content": "nested", "parent_id": reply["id"] }),
        ),
    )
    .await;
    assert_eq!(nested["parent_id"], root_id);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &comments_uri,
            Some(&moth),
            json!({ "content": "lost", "parent_id": Uuid::new_v4() }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, threads) = send(&app, get(&comments_uri, Some(&moth))).await;
    assert_eq!(status, StatusCode::OK);
    let threads = threads.as_array().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0]["content"], "root");
    let replies = threads[0]["replies"].as_array().unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["content"], "reply");
    assert_eq!(replies[1]["content"], "nested");

    let (status, _) = send(
        &app,
        get(&format!("/rooms/{code}/posts/{}/comments", Uuid::new_v4()), Some(&moth)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bans_block_joining_and_writing() {
    let (app, _) = app().await;
    let (code, owner_token) = create_room(&app, json!({ "title": "room" })).await;
    let owner = join_token(
        &app,
        &code,
        json!({ "display_name": "host", "owner_token": owner_token }),
    )
    .await;
    let troll = join_token(&app, &code, json!({ "display_name": "Troll" })).await;

    let bans_uri = format!("/rooms/{code}/bans");
    let (status, _) = send(
        &app,
        json_request("POST", &bans_uri, Some(&troll), json!({ "display_name": "host" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        json_request("POST", &bans_uri, Some(&owner), json!({ "display_name": "host" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, ban) = send(
        &app,
        json_request(
            "POST",
            &bans_uri,
            Some(&owner),
            json!({ "display_name": "troll", "reason": "spam" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ban["reason"], "spam");

    // Existing session loses write access
    let (status, body) = send(
        &app,
        json_request("POST", &format!("/rooms/{code}/posts"), Some(&troll), json!({ "content": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "banned");

    // Case-insensitive on join
    let (status, body) = join(&app, &code, json!({ "display_name": "TROLL" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "banned");

    let (_, bans) = send(&app, get(&bans_uri, Some(&owner))).await;
    assert_eq!(bans.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        json_request("DELETE", &format!("{bans_uri}/troll"), Some(&owner), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = join(&app, &code, json!({ "display_name": "troll" })).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reports_flow() {
    let (app, _) = app().await;
    let (code, owner_token) = create_room(&app, json!({ "title": "room" })).await;
    let owner = join_token(
        &app,
        &code,
        json!({ "display_name": "host", "owner_token": owner_token }),
    )
    .await;
    let moth = join_token(&app, &code, json!({ "display_name": "moth" })).await;

    let (_, post) = send(
        &app,
        json_request("POST", &format!("/rooms/{code}/posts"), Some(&owner), json!({ "content": "hm" })),
    )
    .await;

    let reports_uri = format!("/rooms/{code}/reports");
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &reports_uri,
            Some(&moth),
            json!({ "content_type": "comment", "content_id": post["id"], "reason": "rude" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, report) = send(
        &app,
        json_request(
            "POST",
            &reports_uri,
            Some(&moth),
            json!({ "content_type": "post", "content_id": post["id"], "reason": "rude" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["status"], "pending");

    let (status, _) = send(&app, get(&reports_uri, Some(&moth))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let report_uri = format!("{reports_uri}/{}", report["id"].as_str().unwrap());
    let (status, updated) = send(
        &app,
        json_request("PATCH", &report_uri, Some(&owner), json!({ "status": "resolved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "resolved");

    let (_, pending) = send(&app, get(&format!("{reports_uri}?status=pending"), Some(&owner))).await;
    assert!(pending.as_array().unwrap().is_empty());
    let (_, all) = send(&app, get(&reports_uri, Some(&owner))).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn uploads_follow_media_policy() {
    let (app, _) = app_with_policy(MediaPolicy::with_max_bytes(16)).await;
    let (code, _) = create_room(&app, json!({ "title": "room" })).await;
    let moth = join_token(&app, &code, json!({ "display_name": "moth" })).await;
    let uploads_uri = format!("/rooms/{code}/uploads");

    let upload = |content_type: &str, bytes: Vec<u8>| {
        Request::builder()
            .method("POST")
            .uri(&uploads_uri)
            .header(header::AUTHORIZATION, format!("Bearer {moth}"))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(bytes))
            .unwrap()
    };

    let (status, body) = send(&app, upload("application/pdf", vec![1; 8])).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"], "media_rejected");

    let (status, _) = send(&app, upload("image/png", vec![1; 17])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, _) = send(&app, upload("image/png", Vec::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, uploaded) = send(&app, upload("image/PNG", vec![7; 16])).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(uploaded["mime_type"], "image/png");
    assert_eq!(uploaded["size_bytes"], 16);

    let url = uploaded["url"].as_str().unwrap();
    let res = app.clone().oneshot(get(url, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], &[7u8; 16]);

    // Attach it to a post
    let (status, post) = send(
        &app,
        json_request(
            "POST",
            &format!("/rooms/{code}/posts"),
            Some(&moth),
            json!({ "content": "look", "media": [uploaded["id"]] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["media"][0]["url"], url);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/rooms/{code}/posts"),
            Some(&moth),
            json!({ "content": "look", "media": [Uuid::new_v4()] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_a_room_ends_it() {
    let (app, _) = app().await;
    let (code, owner_token) = create_room(&app, json!({ "title": "room" })).await;
    let owner = join_token(
        &app,
        &code,
        json!({ "display_name": "host", "owner_token": owner_token }),
    )
    .await;
    let moth = join_token(&app, &code, json!({ "display_name": "moth" })).await;

    let room_uri = format!("/rooms/{code}");
    let (status, _) = send(&app, json_request("DELETE", &room_uri, Some(&moth), json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = send(
        &app,
        json_request("PATCH", &room_uri, Some(&owner), json!({ "title": "renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "renamed");

    let (status, _) = send(&app, json_request("DELETE", &room_uri, Some(&owner), json!({}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get(&room_uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get(&format!("{room_uri}/posts"), Some(&moth))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// Owner and one member in a fresh room: (code, owner session, member session).
async fn room_with_member(app: &Router, member: &str) -> (String, String, String) {
    let (code, owner_token) = create_room(app, json!({ "title": "room" })).await;
    let owner = join_token(
        app,
        &code,
        json!({ "display_name": "host", "owner_token": owner_token }),
    )
    .await;
    let member = join_token(app, &code, json!({ "display_name": member })).await;
    (code, owner, member)
}

async fn post_as(app: &Router, code: &str, token: &str, content: &str) -> String {
    let (status, post) = send(
        app,
        json_request("POST", &format!("/rooms/{code}/posts"), Some(token), json!({ "content": content })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{post}");
    post["id"].as_str().unwrap().to_string()
}

async fn comment_as(app: &Router, code: &str, post_id: &str, token: &str, body: Value) -> Value {
    let (status, comment) = send(
        app,
        json_request("POST", &format!("/rooms/{code}/posts/{post_id}/comments"), Some(token), body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{comment}");
    comment
}

#[tokio::test]
async fn banned_sessions_cannot_delete_or_report() {
    let (app, _) = app().await;
    let (code, owner, troll) = room_with_member(&app, "troll").await;

    let post_id = post_as(&app, &code, &troll, "mine").await;
    let comment = comment_as(&app, &code, &post_id, &troll, json!({ "content": "also mine" })).await;

    let (status, _) = send(
        &app,
        json_request("POST", &format!("/rooms/{code}/bans"), Some(&owner), json!({ "display_name": "troll" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/rooms/{code}/reports"),
            Some(&troll),
            json!({ "content_type": "post", "content_id": post_id, "reason": "spite" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "banned");

    let comment_uri = format!("/rooms/{code}/comments/{}", comment["id"].as_str().unwrap());
    let (status, body) = send(&app, json_request("DELETE", &comment_uri, Some(&troll), json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "banned");

    let post_uri = format!("/rooms/{code}/posts/{post_id}");
    let (status, body) = send(&app, json_request("DELETE", &post_uri, Some(&troll), json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "banned");

    // The content is still there for the owner to deal with
    let (_, posts) = send(&app, get(&format!("/rooms/{code}/posts"), Some(&owner))).await;
    assert_eq!(posts.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reply_to_reply_under_deleted_root_stays_in_thread() {
    let (app, _) = app().await;
    let (code, owner, moth) = room_with_member(&app, "moth").await;
    let post_id = post_as(&app, &code, &moth, "hi").await;

    let root = comment_as(&app, &code, &post_id, &moth, json!({ "content": "root" })).await;
    let reply = comment_as(
        &app,
        &code,
        &post_id,
        &moth,
        json!({ "content": "reply", "parent_id": root["id"] }),
    )
    .await;

    let (status, _) = send(
        &app,
        json_request(
            "DELETE",
            &format!("/rooms/{code}/comments/{}", root["id"].as_str().unwrap()),
            Some(&owner),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let answer = comment_as(
        &app,
        &code,
        &post_id,
        &moth,
        json!({ "content": "answer to reply", "parent_id": reply["id"] }),
    )
    .await;
    assert_eq!(answer["parent_id"], reply["id"]);

    let (_, threads) = send(&app, get(&format!("/rooms/{code}/posts/{post_id}/comments"), Some(&moth))).await;
    let threads = threads.as_array().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0]["content"], "reply");
    assert_eq!(threads[0]["replies"][0]["content"], "answer to reply");
}

#[tokio::test]
async fn comment_deletion_rights_and_visibility() {
    let (app, _) = app().await;
    let (code, owner, moth) = room_with_member(&app, "moth").await;
    let wren = join_token(&app, &code, json!({ "display_name": "wren" })).await;
    let post_id = post_as(&app, &code, &moth, "hi").await;

    let first = comment_as(&app, &code, &post_id, &moth, json!({ "content": "first" })).await;
    let second = comment_as(&app, &code, &post_id, &moth, json!({ "content": "second" })).await;
    let first_uri = format!("/rooms/{code}/comments/{}", first["id"].as_str().unwrap());
    let second_uri = format!("/rooms/{code}/comments/{}", second["id"].as_str().unwrap());

    let (status, _) = send(&app, json_request("DELETE", &first_uri, Some(&wren), json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, json_request("DELETE", &first_uri, Some(&moth), json!({}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, json_request("DELETE", &second_uri, Some(&owner), json!({}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, json_request("DELETE", &second_uri, Some(&owner), json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, threads) = send(&app, get(&format!("/rooms/{code}/posts/{post_id}/comments"), Some(&moth))).await;
    assert!(threads.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn post_feed_pages_with_a_cursor() {
    let (app, _) = app().await;
    let (code, _, moth) = room_with_member(&app, "moth").await;
    for n in 0..5 {
        post_as(&app, &code, &moth, &format!("post {n}")).await;
    }
    let posts_uri = format!("/rooms/{code}/posts");

    let (status, page) = send(&app, get(&format!("{posts_uri}?limit=2"), Some(&moth))).await;
    assert_eq!(status, StatusCode::OK);
    let page = page.as_array().unwrap().clone();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["content"], "post 4");
    assert_eq!(page[1]["content"], "post 3");

    let last = &page[1];
    let (_, rest) = send(
        &app,
        get(
            &format!(
                "{posts_uri}?limit=50&before={}&before_id={}",
                last["created_at"].as_str().unwrap(),
                last["id"].as_str().unwrap()
            ),
            Some(&moth),
        ),
    )
    .await;
    let contents: Vec<&str> = rest
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["post 2", "post 1", "post 0"]);

    // Out of range limits are clamped, not rejected
    let (status, clamped) = send(&app, get(&format!("{posts_uri}?limit=0"), Some(&moth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clamped.as_array().unwrap().len(), 1);

    let (status, body) = send(&app, get(&format!("{posts_uri}?before=yesterday"), Some(&moth))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn live_checks_the_session_before_upgrading() {
    let (app, _) = app().await;
    let (code, owner, troll) = room_with_member(&app, "troll").await;
    let (other, _) = create_room(&app, json!({ "title": "elsewhere" })).await;
    let outsider = join_token(&app, &other, json!({ "display_name": "moth" })).await;
    let live_uri = |token: &str| format!("/rooms/{code}/live?token={token}");

    let (status, body) = send(&app, get(&live_uri("garbage"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(&app, get(&live_uri(&outsider), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        json_request("POST", &format!("/rooms/{code}/bans"), Some(&owner), json!({ "display_name": "troll" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, get(&live_uri(&troll), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "banned");

    // A valid session only fails on the missing websocket handshake
    let (status, _) = send(&app, get(&live_uri(&owner), None)).await;
    assert_ne!(status, StatusCode::UNAUTHORIZED);
    assert_ne!(status, StatusCode::FORBIDDEN);
    assert!(status.is_client_error());
}

#[tokio::test]
async fn media_is_gone_with_its_room() {
    let (app, _) = app().await;
    let (code, owner, moth) = room_with_member(&app, "moth").await;

    let req = Request::builder()
        .method("POST")
        .uri(format!("/rooms/{code}/uploads"))
        .header(header::AUTHORIZATION, format!("Bearer {moth}"))
        .header(header::CONTENT_TYPE, "image/gif")
        .body(Body::from(vec![1u8; 4]))
        .unwrap();
    let (status, uploaded) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let url = uploaded["url"].as_str().unwrap().to_string();

    let res = app.clone().oneshot(get(&url, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (status, _) = send(&app, json_request("DELETE", &format!("/rooms/{code}"), Some(&owner), json!({}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, get(&url, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = send(&app, get("/media/not-a-uuid", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let (app, _) = app().await;

    let (status, body) = send(
        &app,
        json_request("POST", "/rooms", None, json!({ "title": "room", "colour": "teal" })),
    )
    .await;
    assert!(status.is_client_error());
    assert_eq!(body["error"], "invalid_request");

    let (status, body) = send(
        &app,
        json_request("POST", "/rooms", None, json!({ "title": "room", "expires_in_hours": -3 })),
    )
    .await;
    assert!(status.is_client_error());
    assert_eq!(body["error"], "invalid_request");

    let (code, _, moth) = room_with_member(&app, "moth").await;
    let (status, body) = send(
        &app,
        json_request("DELETE", &format!("/rooms/{code}/posts/not-a-uuid"), Some(&moth), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}
