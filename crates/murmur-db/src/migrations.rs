use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE rooms (
                id                TEXT PRIMARY KEY,
                code              TEXT NOT NULL UNIQUE,
                title             TEXT NOT NULL,
                description       TEXT,
                owner_token_hash  TEXT NOT NULL,
                password_hash     TEXT,
                ephemeral         INTEGER NOT NULL DEFAULT 1,
                expires_at        TEXT,
                created_at        TEXT NOT NULL
            );

            CREATE INDEX idx_rooms_expires
                ON rooms(expires_at) WHERE expires_at IS NOT NULL;

            CREATE TABLE posts (
                id           TEXT PRIMARY KEY,
                room_id      TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                author_name  TEXT NOT NULL,
                content      TEXT NOT NULL,
                media        TEXT NOT NULL DEFAULT '[]',
                pinned       INTEGER NOT NULL DEFAULT 0,
                deleted_at   TEXT,
                created_at   TEXT NOT NULL
            );

            CREATE INDEX idx_posts_room
                ON posts(room_id, created_at);

            CREATE TABLE comments (
                id           TEXT PRIMARY KEY,
                post_id      TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                parent_id    TEXT REFERENCES comments(id) ON DELETE CASCADE,
                author_name  TEXT NOT NULL,
                content      TEXT NOT NULL,
                deleted_at   TEXT,
                created_at   TEXT NOT NULL
            );

            CREATE INDEX idx_comments_post
                ON comments(post_id, created_at);

            CREATE TABLE bans (
                id            TEXT PRIMARY KEY,
                room_id       TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                display_name  TEXT NOT NULL COLLATE NOCASE,
                reason        TEXT,
                expires_at    TEXT,
                created_at    TEXT NOT NULL,
                UNIQUE(room_id, display_name)
            );

            CREATE TABLE uploads (
                id             TEXT PRIMARY KEY,
                room_id        TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                uploader_name  TEXT NOT NULL,
                url            TEXT NOT NULL,
                mime_type      TEXT NOT NULL,
                size_bytes     INTEGER NOT NULL,
                created_at     TEXT NOT NULL
            );

            CREATE INDEX idx_uploads_room
                ON uploads(room_id);

            CREATE TABLE reports (
                id             TEXT PRIMARY KEY,
                room_id        TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                content_type   TEXT NOT NULL CHECK (content_type IN ('post', 'comment')),
                content_id     TEXT NOT NULL,
                reason         TEXT NOT NULL,
                status         TEXT NOT NULL DEFAULT 'pending'
                               CHECK (status IN ('pending', 'resolved', 'dismissed')),
                reporter_name  TEXT NOT NULL,
                created_at     TEXT NOT NULL
            );

            CREATE INDEX idx_reports_room
                ON reports(room_id, status);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
