use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use murmur_db::models::RoomRow;
use murmur_types::RoomCode;
use murmur_types::api::{
    CreateRoomRequest, CreateRoomResponse, JoinRoomRequest, JoinRoomResponse, UpdateRoomRequest,
};
use murmur_types::events::CloseReason;

use crate::admission::{Credentials, admit};
use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::session::Session;
use crate::state::{AppState, run_db};
use crate::tokens::{hash_owner_token, hash_password, issue_session, new_owner_token, session_expiry};
use crate::validate::{self, DEFAULT_EPHEMERAL_HOURS, MAX_EXPIRY_HOURS};

/// Attempts at drawing an unused room code before giving up.
const CODE_ATTEMPTS: usize = 5;

/// POST /rooms
pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = validate::text("title", &req.title, validate::TITLE_MAX)?;
    let description =
        validate::optional_text("description", req.description.as_deref(), validate::DESCRIPTION_MAX)?;
    let password = req.password.as_deref().map(validate::password).transpose()?;

    let hours = match (req.ephemeral, req.expires_in_hours) {
        (_, Some(h)) if h == 0 || h > MAX_EXPIRY_HOURS => {
            return Err(ApiError::validation(format!(
                "expires_in_hours must be between 1 and {MAX_EXPIRY_HOURS}"
            )));
        }
        (_, Some(h)) => Some(h),
        (true, None) => Some(DEFAULT_EPHEMERAL_HOURS),
        (false, None) => None,
    };

    let now = Utc::now();
    let owner_token = new_owner_token();
    let owner_token_hash = hash_owner_token(&owner_token);
    let ephemeral = req.ephemeral;
    let expires_at = hours.map(|h| now + Duration::hours(i64::from(h)));

    let room = run_db(&state, move |db| {
        let password_hash = password.as_deref().map(hash_password).transpose()?;

        for _ in 0..CODE_ATTEMPTS {
            let row = RoomRow {
                id: Uuid::new_v4().to_string(),
                code: RoomCode::generate().to_string(),
                title: title.clone(),
                description: description.clone(),
                owner_token_hash: owner_token_hash.clone(),
                password_hash: password_hash.clone(),
                ephemeral,
                expires_at,
                created_at: now,
            };
            if db.try_insert_room(&row)? {
                return Ok(row);
            }
            warn!("Room code {} already taken, drawing another", row.code);
        }
        anyhow::bail!("no free room code after {} attempts", CODE_ATTEMPTS)
    })
    .await?;

    let code = RoomCode::parse(&room.code)?;
    info!("Room {} created (ephemeral: {}, expires: {:?})", code, room.ephemeral, room.expires_at);

    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse {
            room: room.to_room(),
            share_code: code.pretty(),
            owner_token,
        }),
    ))
}

/// GET /rooms/{code}: public preview shown before joining.
pub async fn preview_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let code = RoomCode::parse(&code)?;
    let room = run_db(&state, move |db| db.get_room_by_code(code.as_str()))
        .await?
        .ok_or(ApiError::RoomNotFound)?
        .to_room();

    if room.is_expired_at(Utc::now()) {
        return Err(ApiError::RoomNotFound);
    }

    Ok(Json(room))
}

/// POST /rooms/{code}/join
pub async fn join_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let code = RoomCode::parse(&code)?;
    let display_name = validate::display_name(&req.display_name)?;

    let lookup_code = code.clone();
    let lookup_name = display_name.clone();
    let (room, is_owner) = run_db(&state, move |db| {
        let Some(room) = db.get_room_by_code(lookup_code.as_str())? else {
            return Ok(Err(ApiError::RoomNotFound));
        };

        let now = Utc::now();
        let ban = db.get_active_ban(&room.id, &lookup_name, now)?;
        let credentials = Credentials {
            password: req.password.as_deref(),
            owner_token: req.owner_token.as_deref(),
        };

        Ok(admit(&room, &credentials, ban.as_ref(), now).map(|is_owner| (room, is_owner)))
    })
    .await??;

    let room = room.to_room();
    let expires_at = session_expiry(Utc::now(), room.expires_at);
    let token = issue_session(
        &state.session_secret,
        room.id,
        code.as_str(),
        &display_name,
        is_owner,
        expires_at,
    )?;

    info!("{} joined room {} (owner: {})", display_name, code, is_owner);

    Ok(Json(JoinRoomResponse {
        token,
        room,
        display_name,
        is_owner,
        expires_at,
    }))
}

/// PATCH /rooms/{code}
pub async fn update_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
    session: Session,
    Json(req): Json<UpdateRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_owner()?;
    let room = session.room(&state, &code).await?;

    let title = req
        .title
        .as_deref()
        .map(|t| validate::text("title", t, validate::TITLE_MAX))
        .transpose()?;
    let description = req
        .description
        .as_deref()
        .map(|d| validate::text("description", d, validate::DESCRIPTION_MAX))
        .transpose()?;

    let id = room.id.clone();
    let updated = run_db(&state, move |db| {
        db.update_room(&id, title.as_deref(), description.as_deref())?;
        db.get_room(&id)
    })
    .await?
    .ok_or(ApiError::RoomNotFound)?;

    Ok(Json(updated.to_room()))
}

/// DELETE /rooms/{code}
pub async fn delete_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    session.require_owner()?;
    let room = session.room(&state, &code).await?;

    let id = room.id.clone();
    let upload_ids = run_db(&state, move |db| db.delete_room(&id)).await?;
    let removed = state.storage.delete_files(&upload_ids).await;

    state
        .dispatcher
        .close_room(session.0.sub, CloseReason::Deleted)
        .await;

    info!("Room {} deleted by owner ({} media files removed)", room.code, removed);
    Ok(StatusCode::NO_CONTENT)
}
