use std::sync::{Arc, Mutex, MutexGuard};

use campus_core::clock::{from_db_timestamp, to_db_timestamp, Clock};
use chrono::{DateTime, Utc};
use rusqlite::{types::Type, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{ReminderError, Result};
use crate::types::{Direction, Reminder, ReminderDraft};

/// Persistence for reminder records.
///
/// `claim_for_notification` is the one synchronisation primitive the engine
/// relies on: implementations must make it a single atomic conditional write.
pub trait ReminderStore: Send + Sync {
    /// Insert a new active, un-notified reminder.
    ///
    /// Fails with [`ReminderError::DuplicateActive`] when an active reminder
    /// already exists for the same (user, stop, route, direction).
    fn create(&self, draft: &ReminderDraft) -> Result<Reminder>;

    fn get(&self, id: &str) -> Result<Option<Reminder>>;

    /// All reminders owned by `user_id`, newest first.
    fn list_for_user(&self, user_id: &str) -> Result<Vec<Reminder>>;

    /// Owner-initiated hard delete. Returns false when `id` does not exist or
    /// belongs to someone else.
    fn delete(&self, id: &str, user_id: &str) -> Result<bool>;

    /// Active, un-notified reminders with `reminder_time <= now`. Read-only.
    fn find_due_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>>;

    /// Flip `is_notified` false→true iff it is still false and the reminder is
    /// still active. Returns whether this caller won.
    fn claim_for_notification(&self, id: &str) -> Result<bool>;

    /// Deactivate every active reminder with `target_arrival_time < cutoff`,
    /// notified or not. Returns the number of rows changed.
    fn deactivate_where_arrival_time_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

const REMINDER_COLUMNS: &str = "id, user_id, stop_id, stop_name, route_id, route_name, direction,
     target_arrival_time, reminder_time, is_active, is_notified, created_at, updated_at";

/// SQLite-backed [`ReminderStore`].
///
/// Several stores (in one process or many) may point at the same database
/// file; the conditional UPDATE in `claim_for_notification` stays atomic
/// across all of them.
pub struct SqliteReminderStore {
    db: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteReminderStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection, clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Mutex::new(conn),
            clock,
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| ReminderError::LockPoisoned)
    }

    fn now_str(&self) -> String {
        to_db_timestamp(self.clock.now())
    }
}

impl ReminderStore for SqliteReminderStore {
    #[instrument(skip(self, draft), fields(user_id = %draft.user_id, stop_id = %draft.stop_id, route_id = %draft.route_id))]
    fn create(&self, draft: &ReminderDraft) -> Result<Reminder> {
        let db = self.conn()?;

        let exists: bool = db.query_row(
            "SELECT EXISTS (
                SELECT 1 FROM reminders
                WHERE user_id = ?1 AND stop_id = ?2 AND route_id = ?3
                  AND direction = ?4 AND is_active = 1
             )",
            rusqlite::params![
                draft.user_id,
                draft.stop_id,
                draft.route_id,
                draft.direction.as_i64()
            ],
            |row| row.get(0),
        )?;
        if exists {
            return Err(duplicate(draft));
        }

        let id = Uuid::now_v7().to_string();
        let now = self.now_str();
        let inserted = db.execute(
            "INSERT INTO reminders
             (id, user_id, stop_id, stop_name, route_id, route_name, direction,
              target_arrival_time, reminder_time, is_active, is_notified,
              created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,1,0,?10,?10)",
            rusqlite::params![
                id,
                draft.user_id,
                draft.stop_id,
                draft.stop_name,
                draft.route_id,
                draft.route_name,
                draft.direction.as_i64(),
                to_db_timestamp(draft.target_arrival_time),
                to_db_timestamp(draft.reminder_time),
                now,
            ],
        );
        match inserted {
            Ok(_) => {}
            // Another writer committed the same tuple between our check and insert.
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(duplicate(draft));
            }
            Err(e) => return Err(e.into()),
        }

        let reminder = db.query_row(
            &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
            [&id],
            row_to_reminder,
        )?;
        info!(reminder_id = %reminder.id, reminder_time = %reminder.reminder_time, "reminder created");
        Ok(reminder)
    }

    fn get(&self, id: &str) -> Result<Option<Reminder>> {
        let db = self.conn()?;
        let reminder = db
            .query_row(
                &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
                [id],
                row_to_reminder,
            )
            .optional()?;
        Ok(reminder)
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<Reminder>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"
        ))?;
        let reminders = stmt
            .query_map([user_id], row_to_reminder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reminders)
    }

    fn delete(&self, id: &str, user_id: &str) -> Result<bool> {
        let db = self.conn()?;
        let n = db.execute(
            "DELETE FROM reminders WHERE id = ?1 AND user_id = ?2",
            [id, user_id],
        )?;
        if n > 0 {
            info!(reminder_id = %id, %user_id, "reminder deleted by owner");
        }
        Ok(n > 0)
    }

    fn find_due_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let db = self.conn()?;
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE is_active = 1 AND is_notified = 0 AND reminder_time <= ?1
             ORDER BY reminder_time"
        ))?;
        let due = stmt
            .query_map([to_db_timestamp(now)], row_to_reminder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(due)
    }

    fn claim_for_notification(&self, id: &str) -> Result<bool> {
        let now = self.now_str();
        let db = self.conn()?;
        let n = db.execute(
            "UPDATE reminders SET is_notified = 1, updated_at = ?2
             WHERE id = ?1 AND is_notified = 0 AND is_active = 1",
            [id, now.as_str()],
        )?;
        debug!(reminder_id = %id, won = n == 1, "claim attempted");
        Ok(n == 1)
    }

    fn deactivate_where_arrival_time_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let now = self.now_str();
        let db = self.conn()?;
        let n = db.execute(
            "UPDATE reminders SET is_active = 0, updated_at = ?2
             WHERE is_active = 1 AND target_arrival_time < ?1",
            [to_db_timestamp(cutoff), now],
        )?;
        Ok(n)
    }
}

fn duplicate(draft: &ReminderDraft) -> ReminderError {
    ReminderError::DuplicateActive {
        stop_id: draft.stop_id.clone(),
        route_id: draft.route_id.clone(),
        direction: draft.direction,
    }
}

fn row_to_reminder(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reminder> {
    let direction: i64 = row.get(6)?;
    Ok(Reminder {
        id: row.get(0)?,
        user_id: row.get(1)?,
        stop_id: row.get(2)?,
        stop_name: row.get(3)?,
        route_id: row.get(4)?,
        route_name: row.get(5)?,
        direction: Direction::try_from(direction)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Integer, Box::new(e)))?,
        target_arrival_time: timestamp_at(row, 7)?,
        reminder_time: timestamp_at(row, 8)?,
        is_active: row.get::<_, i64>(9)? != 0,
        is_notified: row.get::<_, i64>(10)? != 0,
        created_at: timestamp_at(row, 11)?,
        updated_at: timestamp_at(row, 12)?,
    })
}

fn timestamp_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    from_db_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp {raw:?}").into(),
        )
    })
}
