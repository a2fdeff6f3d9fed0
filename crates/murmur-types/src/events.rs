use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Comment, Post};

/// Events pushed to clients over the room websocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RoomEvent {
    /// Server accepted the session
    Ready {
        room_id: Uuid,
        display_name: String,
        is_owner: bool,
    },

    PostCreated { post: Post },

    /// Pin state or other mutable fields changed
    PostUpdated { post: Post },

    PostDeleted { post_id: Uuid },

    CommentCreated { comment: Comment },

    CommentDeleted { comment_id: Uuid, post_id: Uuid },

    /// The owner banned a display name; that name's connections are closed
    UserBanned { display_name: String },

    /// The room was deleted by its owner or expired
    RoomClosed { reason: CloseReason },

    /// Display names currently connected to the room
    PresenceUpdate { online: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Deleted,
    Expired,
}
