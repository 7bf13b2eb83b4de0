use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id            TEXT PRIMARY KEY,
                email         TEXT NOT NULL UNIQUE,
                display_name  TEXT,
                password      TEXT,
                created_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE clubs (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                one_line_intro  TEXT NOT NULL DEFAULT '',
                description     TEXT NOT NULL DEFAULT '',
                interview_date  TEXT NOT NULL DEFAULT '',
                image_url       TEXT NOT NULL,
                owner_id        TEXT NOT NULL,
                tags            TEXT NOT NULL DEFAULT '[]',
                club_link       TEXT NOT NULL DEFAULT '',
                created_at      TEXT,
                updated_at      TEXT
            );

            CREATE INDEX idx_clubs_owner ON clubs(owner_id, created_at);

            -- created_at is nullable: rows with a missing or malformed
            -- timestamp still load, with an unknown time.
            CREATE TABLE messages (
                id           TEXT PRIMARY KEY,
                sender_id    TEXT NOT NULL,
                receiver_id  TEXT NOT NULL,
                body         TEXT NOT NULL,
                club_id      TEXT,
                club_name    TEXT,
                created_at   TEXT,
                read         INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_messages_receiver ON messages(receiver_id, sender_id);
            CREATE INDEX idx_messages_sender ON messages(sender_id, receiver_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
