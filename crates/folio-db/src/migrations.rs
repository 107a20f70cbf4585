use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            full_name   TEXT NOT NULL,
            password    TEXT NOT NULL,
            role        TEXT NOT NULL DEFAULT 'user'
                        CHECK (role IN ('user', 'operator')),
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS requests (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at      TEXT NOT NULL,
            user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            from_user       TEXT NOT NULL,
            plan            TEXT NOT NULL,
            text            TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'pending'
                            CHECK (status IN ('pending', 'answered', 'closed')),
            answer          TEXT,
            viewed_by_user  TEXT NOT NULL DEFAULT 'false'
                            CHECK (viewed_by_user IN ('true', 'false')),
            -- a pending request never carries an answer
            CHECK (status != 'pending' OR answer IS NULL)
        );

        CREATE INDEX IF NOT EXISTS idx_requests_user
            ON requests(user_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_requests_status
            ON requests(status);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
