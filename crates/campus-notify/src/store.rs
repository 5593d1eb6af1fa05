use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use campus_core::clock::to_db_timestamp;
use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{NotifyError, Result};
use crate::types::{NewNotification, Notification};

/// Write side of the notification inbox.
///
/// The only promise a producer gets is "one record with these fields exists
/// once this returns `Ok`".
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn create(&self, new: NewNotification) -> Result<Notification>;
}

/// SQLite-backed notification inbox.
pub struct SqliteNotificationStore {
    db: Mutex<Connection>,
}

impl SqliteNotificationStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Newest-first notifications for a user.
    pub fn list_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<Notification>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT id, user_id, type, title, content, related_id, is_read, created_at
             FROM notifications
             WHERE user_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;
        let notifications = stmt
            .query_map(rusqlite::params![user_id, limit], row_to_notification)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notifications)
    }

    /// Number of notifications pointing at `related_id`.
    pub fn count_for_related(&self, related_id: &str) -> Result<usize> {
        let db = self.conn()?;
        let n: i64 = db.query_row(
            "SELECT COUNT(*) FROM notifications WHERE related_id = ?1",
            [related_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| NotifyError::LockPoisoned)
    }

    fn insert(&self, new: NewNotification) -> Result<Notification> {
        let id = Uuid::now_v7().to_string();
        let now = to_db_timestamp(Utc::now());

        let db = self.conn()?;
        db.execute(
            "INSERT INTO notifications
             (id, user_id, type, title, content, related_id, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            rusqlite::params![
                id,
                new.user_id,
                new.kind,
                new.title,
                new.content,
                new.related_id,
                now
            ],
        )?;

        Ok(Notification {
            id,
            user_id: new.user_id,
            kind: new.kind,
            title: new.title,
            content: new.content,
            related_id: new.related_id,
            is_read: false,
            created_at: now,
        })
    }
}

#[async_trait]
impl NotificationSink for SqliteNotificationStore {
    #[instrument(skip(self, new), fields(user_id = %new.user_id, kind = %new.kind))]
    async fn create(&self, new: NewNotification) -> Result<Notification> {
        let notification = self.insert(new)?;
        debug!(notification_id = %notification.id, "notification stored");
        Ok(notification)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        related_id: row.get(5)?,
        is_read: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
    })
}
