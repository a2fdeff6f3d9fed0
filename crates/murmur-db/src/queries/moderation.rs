use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;

use murmur_types::models::{ContentType, ReportStatus};

use super::OptionalExt;
use crate::Database;
use crate::models::{BanRow, ReportRow};

const BAN_COLUMNS: &str = "id, room_id, display_name, reason, expires_at, created_at";
const REPORT_COLUMNS: &str =
    "id, room_id, content_type, content_id, reason, status, reporter_name, created_at";

impl Database {
    // -- Bans --

    /// Insert a ban, or replace reason/expiry if the name is already banned
    /// in the room. Names compare case-insensitively.
    pub fn upsert_ban(&self, ban: &BanRow) -> Result<BanRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO bans (id, room_id, display_name, reason, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (room_id, display_name) DO UPDATE
                 SET reason = excluded.reason,
                     expires_at = excluded.expires_at,
                     created_at = excluded.created_at",
                rusqlite::params![
                    ban.id,
                    ban.room_id,
                    ban.display_name,
                    ban.reason,
                    ban.expires_at,
                    ban.created_at,
                ],
            )?;

            let sql = format!(
                "SELECT {} FROM bans WHERE room_id = ?1 AND display_name = ?2",
                BAN_COLUMNS
            );
            let row = conn.query_row(&sql, [&ban.room_id, &ban.display_name], map_ban)?;
            Ok(row)
        })
    }

    /// The ban on `display_name` in `room_id`, ignoring lapsed ones.
    pub fn get_active_ban(
        &self,
        room_id: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BanRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM bans
                 WHERE room_id = ?1 AND display_name = ?2
                   AND (expires_at IS NULL OR expires_at > ?3)",
                BAN_COLUMNS
            );
            let row = conn
                .query_row(&sql, rusqlite::params![room_id, display_name, now], map_ban)
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_active_bans(&self, room_id: &str, now: DateTime<Utc>) -> Result<Vec<BanRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM bans
                 WHERE room_id = ?1 AND (expires_at IS NULL OR expires_at > ?2)
                 ORDER BY created_at DESC",
                BAN_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![room_id, now], map_ban)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_ban(&self, room_id: &str, display_name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM bans WHERE room_id = ?1 AND display_name = ?2",
                [room_id, display_name],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn prune_expired_bans(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM bans WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                [now],
            )?;
            Ok(removed)
        })
    }

    // -- Reports --

    pub fn insert_report(&self, report: &ReportRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reports (id, room_id, content_type, content_id, reason, status,
                                      reporter_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    report.id,
                    report.room_id,
                    report.content_type,
                    report.content_id,
                    report.reason,
                    report.status,
                    report.reporter_name,
                    report.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Reports for a room, newest first, optionally filtered by status.
    pub fn list_reports(&self, room_id: &str, status: Option<ReportStatus>) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM reports
                 WHERE room_id = ?1 AND (?2 IS NULL OR status = ?2)
                 ORDER BY created_at DESC",
                REPORT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![room_id, status.map(|s| s.as_str())],
                    map_report,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns the updated report, or `None` if it is not in this room.
    pub fn update_report_status(
        &self,
        room_id: &str,
        report_id: &str,
        status: ReportStatus,
    ) -> Result<Option<ReportRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE reports SET status = ?3 WHERE id = ?1 AND room_id = ?2",
                [report_id, room_id, status.as_str()],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            let sql = format!("SELECT {} FROM reports WHERE id = ?1", REPORT_COLUMNS);
            let row = conn.query_row(&sql, [report_id], map_report)?;
            Ok(Some(row))
        })
    }

    /// Whether the reported post or comment exists in the room. Soft-deleted
    /// content still counts so late reports are not rejected.
    pub fn content_exists(
        &self,
        room_id: &str,
        content_type: ContentType,
        content_id: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let sql = match content_type {
                ContentType::Post => "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1 AND room_id = ?2)",
                ContentType::Comment => {
                    "SELECT EXISTS(
                        SELECT 1 FROM comments c JOIN posts p ON p.id = c.post_id
                        WHERE c.id = ?1 AND p.room_id = ?2
                     )"
                }
            };
            let exists: bool = conn.query_row(sql, [content_id, room_id], |row| row.get(0))?;
            Ok(exists)
        })
    }
}

fn map_ban(row: &Row<'_>) -> rusqlite::Result<BanRow> {
    Ok(BanRow {
        id: row.get(0)?,
        room_id: row.get(1)?,
        display_name: row.get(2)?,
        reason: row.get(3)?,
        expires_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_report(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        room_id: row.get(1)?,
        content_type: row.get(2)?,
        content_id: row.get(3)?,
        reason: row.get(4)?,
        status: row.get(5)?,
        reporter_name: row.get(6)?,
        created_at: row.get(7)?,
    })
}
