use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;

use murmur_db::models::RoomRow;
use murmur_types::RoomCode;
use murmur_types::api::Claims;

use crate::error::ApiError;
use crate::state::{AppState, run_db};
use crate::tokens::decode_session;

/// A verified room session taken from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct Session(pub Claims);

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let claims = decode_session(&state.session_secret, token).ok_or(ApiError::Unauthorized)?;
        Ok(Self(claims))
    }
}

impl Session {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_owner(&self) -> bool {
        self.0.owner
    }

    pub fn require_owner(&self) -> Result<(), ApiError> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("only the room owner can do that"))
        }
    }

    /// Resolve the room named in the path and check this session belongs to
    /// it. A deleted room whose code was later reused does not match the
    /// session's room id and is rejected.
    pub async fn room(&self, state: &AppState, code: &str) -> Result<RoomRow, ApiError> {
        let code = RoomCode::parse(code)?;
        if code.as_str() != self.0.code {
            return Err(ApiError::Forbidden("session belongs to another room"));
        }

        let lookup = code.to_string();
        let room = run_db(state, move |db| db.get_room_by_code(&lookup))
            .await?
            .ok_or(ApiError::RoomNotFound)?;

        if room.id != self.0.sub.to_string() {
            return Err(ApiError::Unauthorized);
        }
        if room.expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(ApiError::RoomExpired);
        }

        Ok(room)
    }

    /// Bans apply mid-session: every write checks again. Owners are exempt.
    pub async fn ensure_not_banned(&self, state: &AppState, room_id: &str) -> Result<(), ApiError> {
        if self.is_owner() {
            return Ok(());
        }

        let room_id = room_id.to_string();
        let name = self.0.name.clone();
        let ban = run_db(state, move |db| db.get_active_ban(&room_id, &name, Utc::now())).await?;
        match ban {
            Some(_) => Err(ApiError::Banned),
            None => Ok(()),
        }
    }

    /// Authors may remove their own content; owners may remove anything.
    pub fn can_moderate(&self, author_name: &str) -> bool {
        self.is_owner() || self.0.name == author_name
    }
}
