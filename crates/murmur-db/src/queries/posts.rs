use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;

use super::OptionalExt;
use crate::Database;
use crate::models::{PostCursor, PostRow};

const POST_COLUMNS: &str = "id, room_id, author_name, content, media, pinned, deleted_at, created_at";

impl Database {
    pub fn insert_post(&self, post: &PostRow) -> Result<()> {
        let media = serde_json::to_string(&post.media)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, room_id, author_name, content, media, pinned, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    post.id,
                    post.room_id,
                    post.author_name,
                    post.content,
                    media,
                    post.pinned,
                    post.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch a live (not soft-deleted) post belonging to `room_id`.
    pub fn get_post(&self, room_id: &str, post_id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM posts WHERE id = ?1 AND room_id = ?2 AND deleted_at IS NULL",
                POST_COLUMNS
            );
            let row = conn.query_row(&sql, [post_id, room_id], map_post).optional()?;
            Ok(row)
        })
    }

    /// Live posts, pinned first, then newest first.
    ///
    /// Cursor pagination: with `before` set only unpinned posts after the
    /// cursor in `(created_at, id)` order are returned, so pinned posts appear
    /// on the first page only. A cursor without an id skips every post sharing
    /// its timestamp.
    pub fn list_posts(
        &self,
        room_id: &str,
        limit: u32,
        before: Option<&PostCursor>,
    ) -> Result<Vec<PostRow>> {
        let before_at = before.map(|c| c.created_at);
        let before_id = before.and_then(|c| c.id.as_deref());

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM posts
                 WHERE room_id = ?1
                   AND deleted_at IS NULL
                   AND (?2 IS NULL OR (pinned = 0 AND (
                        created_at < ?2
                        OR (?4 IS NOT NULL AND created_at = ?2 AND id < ?4))))
                 ORDER BY pinned DESC, created_at DESC, id DESC
                 LIMIT ?3",
                POST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![room_id, before_at, limit, before_id], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns `false` if no live post matched.
    pub fn set_post_pinned(&self, room_id: &str, post_id: &str, pinned: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET pinned = ?3
                 WHERE id = ?1 AND room_id = ?2 AND deleted_at IS NULL",
                rusqlite::params![post_id, room_id, pinned],
            )?;
            Ok(changed > 0)
        })
    }

    /// Soft delete. Returns `false` if no live post matched.
    pub fn soft_delete_post(&self, room_id: &str, post_id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET deleted_at = ?3
                 WHERE id = ?1 AND room_id = ?2 AND deleted_at IS NULL",
                rusqlite::params![post_id, room_id, now],
            )?;
            Ok(changed > 0)
        })
    }
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    let media: String = row.get(4)?;
    Ok(PostRow {
        id: row.get(0)?,
        room_id: row.get(1)?,
        author_name: row.get(2)?,
        content: row.get(3)?,
        media: serde_json::from_str(&media).unwrap_or_default(),
        pinned: row.get(5)?,
        deleted_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}
