//! Deciding whether someone may enter a room.

use chrono::{DateTime, Utc};

use murmur_db::models::{BanRow, RoomRow};

use crate::error::ApiError;
use crate::tokens::{verify_owner_token, verify_password};

/// What a join attempt presented.
#[derive(Debug, Default)]
pub struct Credentials<'a> {
    pub password: Option<&'a str>,
    pub owner_token: Option<&'a str>,
}

/// Run the join checks against an already-fetched room, in order: expiry,
/// owner token, password, ban. `active_ban` is the caller's ban lookup for
/// the display name. Returns whether the joiner is the owner.
pub fn admit(
    room: &RoomRow,
    credentials: &Credentials<'_>,
    active_ban: Option<&BanRow>,
    now: DateTime<Utc>,
) -> Result<bool, ApiError> {
    if room.expires_at.is_some_and(|at| at <= now) {
        return Err(ApiError::RoomExpired);
    }

    if let Some(token) = credentials.owner_token {
        if !verify_owner_token(token, &room.owner_token_hash) {
            return Err(ApiError::InvalidOwnerToken);
        }
        return Ok(true);
    }

    if let Some(hash) = &room.password_hash {
        let supplied = credentials.password.unwrap_or_default();
        if !verify_password(supplied, hash) {
            return Err(ApiError::InvalidPassword);
        }
    }

    // lapsed bans are already filtered by the lookup; check anyway
    if active_ban.is_some_and(|b| b.expires_at.is_none_or(|at| at > now)) {
        return Err(ApiError::Banned);
    }

    Ok(false)
}
