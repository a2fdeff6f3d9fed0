use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ContentType, ReportStatus, Room};

// -- Session claims --

/// Claims carried by a room session token. Shared by the REST middleware and
/// the websocket upgrade so both accept the same tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Room id the session is scoped to.
    pub sub: Uuid,
    pub code: String,
    pub name: String,
    pub owner: bool,
    pub exp: usize,
}

// -- Rooms --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRoomRequest {
    pub title: String,
    pub description: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_ephemeral")]
    pub ephemeral: bool,
    pub expires_in_hours: Option<u32>,
}

fn default_ephemeral() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub room: Room,
    /// `ABCD-EFGH` form for sharing.
    pub share_code: String,
    /// Shown once. Only its hash is kept server-side.
    pub owner_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRoomRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinRoomRequest {
    pub display_name: String,
    pub password: Option<String>,
    pub owner_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinRoomResponse {
    pub token: String,
    pub room: Room,
    pub display_name: String,
    pub is_owner: bool,
    pub expires_at: DateTime<Utc>,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub content: String,
    #[serde(default)]
    pub media: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinPostRequest {
    pub pinned: bool,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent_id: Option<Uuid>,
}

// -- Moderation --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBanRequest {
    pub display_name: String,
    pub reason: Option<String>,
    pub duration_hours: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateReportRequest {
    pub content_type: ContentType,
    pub content_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateReportRequest {
    pub status: ReportStatus,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
