//! Secrets: room passwords, owner tokens and session tokens.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use murmur_types::api::Claims;

/// Longest a session token lives, even in a room without expiry.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Hash a room password with Argon2id.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// 32 random bytes, base64url without padding.
pub fn new_owner_token() -> String {
    let bytes: [u8; 32] = rand::random();
    B64.encode(bytes)
}

/// Owner tokens are high-entropy, so a plain SHA-256 is enough to store them.
pub fn hash_owner_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn verify_owner_token(token: &str, stored_hash: &str) -> bool {
    let candidate = hash_owner_token(token);
    // fixed-length hex, compare without early exit
    candidate.len() == stored_hash.len()
        && candidate
            .bytes()
            .zip(stored_hash.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Expiry for a session in a room: the room's own expiry or the session
/// TTL, whichever comes first.
pub fn session_expiry(now: DateTime<Utc>, room_expires_at: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let ttl = now + Duration::hours(SESSION_TTL_HOURS);
    match room_expires_at {
        Some(at) if at < ttl => at,
        _ => ttl,
    }
}

pub fn issue_session(
    secret: &str,
    room_id: Uuid,
    code: &str,
    display_name: &str,
    owner: bool,
    expires_at: DateTime<Utc>,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: room_id,
        code: code.to_string(),
        name: display_name.to_string(),
        owner,
        exp: expires_at.timestamp().max(0) as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Decode and validate a session token. Expired or tampered tokens yield `None`.
pub fn decode_session(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}
