use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use murmur_media::PolicyError;
use murmur_types::CodeError;
use murmur_types::api::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid room code: {0}")]
    InvalidCode(#[from] CodeError),

    #[error("{0}")]
    Validation(String),

    /// A body, path or query string that failed to deserialize.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("room not found")]
    RoomNotFound,

    #[error("room has expired")]
    RoomExpired,

    #[error("owner token does not match")]
    InvalidOwnerToken,

    #[error("wrong room password")]
    InvalidPassword,

    #[error("you are banned from this room")]
    Banned,

    #[error("missing or invalid session token")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Media(#[from] PolicyError),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCode(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Rejected { status, .. } => *status,
            Self::RoomNotFound | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RoomExpired => StatusCode::GONE,
            Self::InvalidOwnerToken | Self::Banned | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidPassword | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Media(PolicyError::Empty) => StatusCode::BAD_REQUEST,
            Self::Media(PolicyError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Media(PolicyError::UnsupportedType(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCode(_) => "invalid_code",
            Self::Validation(_) | Self::Rejected { .. } => "invalid_request",
            Self::RoomNotFound => "room_not_found",
            Self::RoomExpired => "room_expired",
            Self::InvalidOwnerToken => "invalid_owner_token",
            Self::InvalidPassword => "invalid_password",
            Self::Banned => "banned",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Media(_) => "media_rejected",
            Self::Internal(_) => "internal",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(e) => error!("Request failed: {:#}", e),
            other => debug!("Request rejected: {}", other),
        }

        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
