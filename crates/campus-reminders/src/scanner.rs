use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::Result;
use crate::store::ReminderStore;
use crate::types::Reminder;

/// Read-only query for reminders that are ready to fire.
///
/// The result is a snapshot: by the time a candidate is processed another
/// cycle may have claimed it or the bus may have arrived, so the dispatcher
/// re-checks each one against a fresh clock reading.
pub struct Scanner {
    store: Arc<dyn ReminderStore>,
}

impl Scanner {
    pub fn new(store: Arc<dyn ReminderStore>) -> Self {
        Self { store }
    }

    pub fn scan(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let due = self.store.find_due_candidates(now)?;
        debug!(count = due.len(), %now, "due reminders scanned");
        Ok(due)
    }
}
