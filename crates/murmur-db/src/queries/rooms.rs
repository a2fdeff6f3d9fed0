use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::RoomRow;

const ROOM_COLUMNS: &str = "id, code, title, description, owner_token_hash, password_hash, \
                            ephemeral, expires_at, created_at";

impl Database {
    /// Insert a room. Returns `false` if the code is already taken so the
    /// caller can draw a new one.
    pub fn try_insert_room(&self, room: &RoomRow) -> Result<bool> {
        self.with_conn(|conn| {
            let res = conn.execute(
                "INSERT INTO rooms (id, code, title, description, owner_token_hash, password_hash,
                                    ephemeral, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    room.id,
                    room.code,
                    room.title,
                    room.description,
                    room.owner_token_hash,
                    room.password_hash,
                    room.ephemeral,
                    room.expires_at,
                    room.created_at,
                ],
            );

            match res {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, Some(msg)))
                    if e.code == ErrorCode::ConstraintViolation && msg.contains("rooms.code") =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_room_by_code(&self, code: &str) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| query_room(conn, "code", code))
    }

    pub fn get_room(&self, id: &str) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| query_room(conn, "id", id))
    }

    /// Update the mutable room fields. `None` leaves a field unchanged.
    pub fn update_room(&self, id: &str, title: Option<&str>, description: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE rooms
                 SET title = COALESCE(?2, title),
                     description = COALESCE(?3, description)
                 WHERE id = ?1",
                rusqlite::params![id, title, description],
            )?;
            Ok(())
        })
    }

    /// Delete a room and everything hanging off it. Returns the ids of its
    /// uploads so their files can be removed from the media bucket.
    pub fn delete_room(&self, id: &str) -> Result<Vec<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let upload_ids = {
                let mut stmt = tx.prepare("SELECT id FROM uploads WHERE room_id = ?1")?;
                stmt.query_map([id], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };

            tx.execute("DELETE FROM rooms WHERE id = ?1", [id])?;
            tx.commit()?;

            Ok(upload_ids)
        })
    }

    /// Ids of rooms whose expiry is at or before `now`.
    pub fn expired_room_ids(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM rooms
                 WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            )?;
            let ids = stmt
                .query_map([now], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}

fn query_room(conn: &Connection, column: &str, value: &str) -> Result<Option<RoomRow>> {
    let sql = format!("SELECT {} FROM rooms WHERE {} = ?1", ROOM_COLUMNS, column);
    let row = conn.query_row(&sql, [value], map_room).optional()?;
    Ok(row)
}

fn map_room(row: &Row<'_>) -> rusqlite::Result<RoomRow> {
    Ok(RoomRow {
        id: row.get(0)?,
        code: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        owner_token_hash: row.get(4)?,
        password_hash: row.get(5)?,
        ephemeral: row.get(6)?,
        expires_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}
