use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;

use super::OptionalExt;
use crate::Database;
use crate::models::CommentRow;

impl Database {
    pub fn insert_comment(&self, comment: &CommentRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, parent_id, author_name, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    comment.id,
                    comment.post_id,
                    comment.parent_id,
                    comment.author_name,
                    comment.content,
                    comment.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch a live comment whose post (also live) belongs to `room_id`.
    pub fn get_comment(&self, room_id: &str, comment_id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT c.id, c.post_id, c.parent_id, c.author_name, c.content,
                            c.deleted_at, c.created_at
                     FROM comments c
                     JOIN posts p ON p.id = c.post_id
                     WHERE c.id = ?1
                       AND p.room_id = ?2
                       AND c.deleted_at IS NULL
                       AND p.deleted_at IS NULL",
                    [comment_id, room_id],
                    map_comment,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// All live comments on a post, oldest first. Threading happens above.
    pub fn list_comments(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, post_id, parent_id, author_name, content, deleted_at, created_at
                 FROM comments
                 WHERE post_id = ?1 AND deleted_at IS NULL
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt
                .query_map([post_id], map_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Soft delete. Returns `false` if no live comment matched.
    pub fn soft_delete_comment(&self, comment_id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE comments SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                rusqlite::params![comment_id, now],
            )?;
            Ok(changed > 0)
        })
    }
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        parent_id: row.get(2)?,
        author_name: row.get(3)?,
        content: row.get(4)?,
        deleted_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}
