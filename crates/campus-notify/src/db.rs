use rusqlite::{Connection, Result};

/// Initialise the notifications table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS notifications (
            id          TEXT    NOT NULL PRIMARY KEY,
            user_id     TEXT    NOT NULL,
            type        TEXT    NOT NULL,
            title       TEXT    NOT NULL,
            content     TEXT    NOT NULL,
            related_id  TEXT,
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications (user_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_notifications_related
            ON notifications (related_id);
        ",
    )
}
