use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;

use super::{OptionalExt, placeholders};
use crate::Database;
use crate::models::UploadRow;

const UPLOAD_COLUMNS: &str = "u.id, u.room_id, u.uploader_name, u.url, u.mime_type, u.size_bytes, u.created_at";

impl Database {
    pub fn insert_upload(&self, upload: &UploadRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO uploads (id, room_id, uploader_name, url, mime_type, size_bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    upload.id,
                    upload.room_id,
                    upload.uploader_name,
                    upload.url,
                    upload.mime_type,
                    upload.size_bytes,
                    upload.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch an upload whose room is still open at `now`.
    pub fn get_upload(&self, id: &str, now: DateTime<Utc>) -> Result<Option<UploadRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM uploads u
                 JOIN rooms r ON r.id = u.room_id
                 WHERE u.id = ?1 AND (r.expires_at IS NULL OR r.expires_at > ?2)",
                UPLOAD_COLUMNS
            );
            let row = conn
                .query_row(&sql, rusqlite::params![id, now], map_upload)
                .optional()?;
            Ok(row)
        })
    }

    /// Batch-fetch uploads of one room by id. Ids from other rooms are
    /// silently left out.
    pub fn get_uploads(&self, room_id: &str, ids: &[String]) -> Result<Vec<UploadRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM uploads u WHERE u.room_id = ?1 AND u.id IN ({})",
                UPLOAD_COLUMNS,
                placeholders(2, ids.len())
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::with_capacity(ids.len() + 1);
            params.push(&room_id);
            params.extend(ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));

            let rows = stmt
                .query_map(params.as_slice(), map_upload)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn map_upload(row: &Row<'_>) -> rusqlite::Result<UploadRow> {
    Ok(UploadRow {
        id: row.get(0)?,
        room_id: row.get(1)?,
        uploader_name: row.get(2)?,
        url: row.get(3)?,
        mime_type: row.get(4)?,
        size_bytes: row.get(5)?,
        created_at: row.get(6)?,
    })
}
