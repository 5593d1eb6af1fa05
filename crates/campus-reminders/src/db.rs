use std::time::Duration;

use rusqlite::Connection;

use crate::error::Result;

/// How long a writer waits on another process's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialise the reminder schema in `conn` (idempotent).
///
/// The partial unique index enforces "one active reminder per
/// (user, stop, route, direction)" at the store level; the second index keeps
/// the due-candidate scan cheap.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS reminders (
            id                   TEXT    NOT NULL PRIMARY KEY,
            user_id              TEXT    NOT NULL,
            stop_id              TEXT    NOT NULL,
            stop_name            TEXT    NOT NULL,
            route_id             TEXT    NOT NULL,
            route_name           TEXT    NOT NULL,
            direction            INTEGER NOT NULL CHECK (direction IN (0, 1)),
            target_arrival_time  TEXT    NOT NULL,   -- ISO-8601, fixed width
            reminder_time        TEXT    NOT NULL,   -- ISO-8601, fixed width
            is_active            INTEGER NOT NULL DEFAULT 1,
            is_notified          INTEGER NOT NULL DEFAULT 0,
            created_at           TEXT    NOT NULL,
            updated_at           TEXT    NOT NULL,
            CHECK (reminder_time <= target_arrival_time)
        ) STRICT;

        CREATE UNIQUE INDEX IF NOT EXISTS idx_reminders_one_active
            ON reminders (user_id, stop_id, route_id, direction)
            WHERE is_active = 1;

        -- Scan: WHERE is_active = 1 AND is_notified = 0 AND reminder_time <= ?
        CREATE INDEX IF NOT EXISTS idx_reminders_due
            ON reminders (is_active, is_notified, reminder_time);

        CREATE INDEX IF NOT EXISTS idx_reminders_user
            ON reminders (user_id, created_at DESC);
        ",
    )?;
    Ok(())
}

/// Open a connection suitable for sharing the database file with other
/// worker processes.
pub fn open(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}
