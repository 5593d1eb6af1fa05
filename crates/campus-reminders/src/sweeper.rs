use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::Result;
use crate::store::ReminderStore;

/// Retires reminders whose bus has already arrived, notified or not, so they
/// drop out of every future scan.
pub struct Sweeper {
    store: Arc<dyn ReminderStore>,
}

impl Sweeper {
    pub fn new(store: Arc<dyn ReminderStore>) -> Self {
        Self { store }
    }

    /// Deactivate everything with `target_arrival_time < now`.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let n = self.store.deactivate_where_arrival_time_before(now)?;
        if n > 0 {
            info!(count = n, "expired reminders deactivated");
        }
        Ok(n)
    }
}
