use crate::error::ApiError;

pub const TITLE_MAX: usize = 80;
pub const DESCRIPTION_MAX: usize = 500;
pub const PASSWORD_MIN: usize = 4;
pub const PASSWORD_MAX: usize = 128;
pub const DISPLAY_NAME_MAX: usize = 32;
pub const POST_MAX: usize = 10_000;
pub const COMMENT_MAX: usize = 2_000;
pub const REASON_MAX: usize = 500;
pub const MEDIA_PER_POST: usize = 8;
pub const MAX_EXPIRY_HOURS: u32 = 168;
pub const DEFAULT_EPHEMERAL_HOURS: u32 = 24;

/// Trimmed, non-empty, at most `max` characters.
pub fn text(field: &str, value: &str, max: usize) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max {
        return Err(ApiError::validation(format!("{field} must be at most {max} characters")));
    }
    Ok(trimmed.to_string())
}

/// Like [`text`], but blank input means "not set".
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => text(field, v, max).map(Some),
    }
}

pub fn display_name(value: &str) -> Result<String, ApiError> {
    let name = text("display_name", value, DISPLAY_NAME_MAX)?;
    if name.chars().any(char::is_control) {
        return Err(ApiError::validation("display_name must not contain control characters"));
    }
    Ok(name)
}

/// Passwords are taken verbatim; surrounding spaces are significant.
pub fn password(value: &str) -> Result<String, ApiError> {
    let len = value.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(ApiError::validation(format!(
            "password must be {PASSWORD_MIN} to {PASSWORD_MAX} characters"
        )));
    }
    Ok(value.to_string())
}
