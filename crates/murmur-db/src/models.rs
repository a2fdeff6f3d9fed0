//! Database row types. These map directly to SQLite rows and are kept apart
//! from the murmur-types API models so secrets and soft-delete markers stay in
//! this crate.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use murmur_types::models::{
    Ban, Comment, ContentType, MediaRef, Post, Report, ReportStatus, Room, Upload,
};

pub struct RoomRow {
    pub id: String,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub owner_token_hash: String,
    pub password_hash: Option<String>,
    pub ephemeral: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct PostRow {
    pub id: String,
    pub room_id: String,
    pub author_name: String,
    pub content: String,
    /// Upload ids, stored as a JSON array
    pub media: Vec<String>,
    pub pinned: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Position in the post feed: the last post of the previous page.
#[derive(Debug, Clone)]
pub struct PostCursor {
    pub created_at: DateTime<Utc>,
    pub id: Option<String>,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub author_name: String,
    pub content: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct BanRow {
    pub id: String,
    pub room_id: String,
    pub display_name: String,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct UploadRow {
    pub id: String,
    pub room_id: String,
    pub uploader_name: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

pub struct ReportRow {
    pub id: String,
    pub room_id: String,
    pub content_type: String,
    pub content_id: String,
    pub reason: String,
    pub status: String,
    pub reporter_name: String,
    pub created_at: DateTime<Utc>,
}

fn parse_id(kind: &str, raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", kind, raw, e);
        Uuid::default()
    })
}

impl RoomRow {
    pub fn to_room(&self) -> Room {
        Room {
            id: parse_id("room", &self.id),
            code: self.code.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            has_password: self.password_hash.is_some(),
            ephemeral: self.ephemeral,
            expires_at: self.expires_at,
            created_at: self.created_at,
        }
    }
}

impl PostRow {
    /// `uploads` is the resolved media for this post; ids it lists that are
    /// missing from `uploads` are skipped.
    pub fn to_post(&self, uploads: &[UploadRow]) -> Post {
        let media = self
            .media
            .iter()
            .filter_map(|id| uploads.iter().find(|u| &u.id == id))
            .map(|u| MediaRef {
                id: parse_id("upload", &u.id),
                url: u.url.clone(),
                mime_type: u.mime_type.clone(),
            })
            .collect();

        Post {
            id: parse_id("post", &self.id),
            room_id: parse_id("room", &self.room_id),
            author_name: self.author_name.clone(),
            content: self.content.clone(),
            media,
            pinned: self.pinned,
            created_at: self.created_at,
        }
    }
}

impl CommentRow {
    pub fn to_comment(&self) -> Comment {
        Comment {
            id: parse_id("comment", &self.id),
            post_id: parse_id("post", &self.post_id),
            parent_id: self.parent_id.as_deref().map(|p| parse_id("comment", p)),
            author_name: self.author_name.clone(),
            content: self.content.clone(),
            created_at: self.created_at,
        }
    }
}

impl BanRow {
    pub fn to_ban(&self) -> Ban {
        Ban {
            id: parse_id("ban", &self.id),
            room_id: parse_id("room", &self.room_id),
            display_name: self.display_name.clone(),
            reason: self.reason.clone(),
            expires_at: self.expires_at,
            created_at: self.created_at,
        }
    }
}

impl UploadRow {
    pub fn to_upload(&self) -> Upload {
        Upload {
            id: parse_id("upload", &self.id),
            room_id: parse_id("room", &self.room_id),
            uploader_name: self.uploader_name.clone(),
            url: self.url.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.size_bytes.max(0) as u64,
            created_at: self.created_at,
        }
    }
}

impl ReportRow {
    pub fn to_report(&self) -> Report {
        Report {
            id: parse_id("report", &self.id),
            room_id: parse_id("room", &self.room_id),
            content_type: self.content_type.parse().unwrap_or_else(|e| {
                warn!("Corrupt content_type on report '{}': {}", self.id, e);
                ContentType::Post
            }),
            content_id: parse_id("content", &self.content_id),
            reason: self.reason.clone(),
            status: self.status.parse().unwrap_or_else(|e| {
                warn!("Corrupt status on report '{}': {}", self.id, e);
                ReportStatus::Pending
            }),
            reporter_name: self.reporter_name.clone(),
            created_at: self.created_at,
        }
    }
}
