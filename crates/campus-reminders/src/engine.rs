use std::sync::Arc;

use campus_core::{config::RemindersConfig, Clock};
use campus_notify::{NotificationSink, PushChannel};
use chrono::Duration;
use futures_util::{stream, FutureExt, StreamExt};
use tokio::sync::watch;
use tracing::{error, info, instrument};

use crate::{
    dispatcher::{DispatchOutcome, DispatchPolicy, Dispatcher},
    error::{ReminderError, Result},
    scanner::Scanner,
    store::ReminderStore,
    sweeper::Sweeper,
    types::{CycleSummary, NewReminder, Reminder, MAX_ESTIMATE_SECS},
};

/// Entry point for everything reminder-related: creation, owner management,
/// and the check cycle.
///
/// `run_cycle` holds no state between calls and may run any number of times
/// concurrently, from any number of processes sharing the store.
pub struct ReminderEngine {
    store: Arc<dyn ReminderStore>,
    scanner: Scanner,
    dispatcher: Dispatcher,
    sweeper: Sweeper,
    clock: Arc<dyn Clock>,
    lead_window: Duration,
    max_concurrency: usize,
}

impl ReminderEngine {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        notifications: Arc<dyn NotificationSink>,
        push: Arc<dyn PushChannel>,
        clock: Arc<dyn Clock>,
        config: &RemindersConfig,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            notifications,
            push,
            Arc::clone(&clock),
            DispatchPolicy::from(config),
        );
        Self {
            scanner: Scanner::new(Arc::clone(&store)),
            sweeper: Sweeper::new(Arc::clone(&store)),
            dispatcher,
            store,
            clock,
            // Never longer than the longest accepted estimate.
            lead_window: Duration::seconds(
                config.lead_window_secs.min(MAX_ESTIMATE_SECS as u64) as i64,
            ),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    pub fn lead_window(&self) -> Duration {
        self.lead_window
    }

    /// Validate `new` and persist it as an active reminder.
    pub fn create_reminder(&self, new: NewReminder) -> Result<Reminder> {
        let draft = new.into_draft(self.clock.now(), self.lead_window)?;
        self.store.create(&draft)
    }

    pub fn list_reminders(&self, user_id: &str) -> Result<Vec<Reminder>> {
        self.store.list_for_user(user_id)
    }

    /// Fetch a reminder owned by `user_id`. Other users' reminders are
    /// reported as not found.
    pub fn get_reminder(&self, user_id: &str, id: &str) -> Result<Reminder> {
        match self.store.get(id)? {
            Some(r) if r.user_id == user_id => Ok(r),
            _ => Err(ReminderError::NotFound { id: id.to_string() }),
        }
    }

    pub fn delete_reminder(&self, user_id: &str, id: &str) -> Result<()> {
        if self.store.delete(id, user_id)? {
            Ok(())
        } else {
            Err(ReminderError::NotFound { id: id.to_string() })
        }
    }

    /// Scan, dispatch every candidate, then sweep expired reminders.
    ///
    /// Per-candidate failures are counted in the summary; only a failure to
    /// scan or sweep is returned as an error.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let candidates = self.scanner.scan(self.clock.now())?;
        let mut summary = CycleSummary {
            scanned: candidates.len(),
            ..CycleSummary::default()
        };

        // Owned candidates and boxed futures keep the cycle future `Send`.
        let dispatcher = &self.dispatcher;
        let outcomes: Vec<DispatchOutcome> = stream::iter(candidates)
            .map(|reminder| async move { dispatcher.dispatch(&reminder).await }.boxed())
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                DispatchOutcome::Notified => summary.notified += 1,
                DispatchOutcome::Retired => summary.retired += 1,
                DispatchOutcome::ClaimLost | DispatchOutcome::NotDue => summary.skipped += 1,
                DispatchOutcome::Failed(_) => summary.errors += 1,
            }
        }

        summary.expired = self.sweeper.sweep(self.clock.now())?;

        if summary != CycleSummary::default() {
            info!(
                scanned = summary.scanned,
                notified = summary.notified,
                retired = summary.retired,
                skipped = summary.skipped,
                expired = summary.expired,
                errors = summary.errors,
                "reminder cycle complete"
            );
        }
        Ok(summary)
    }

    /// Run a check cycle every `interval` until `shutdown` broadcasts `true`.
    ///
    /// A failed cycle is logged and retried on the next tick.
    pub async fn run(
        self: Arc<Self>,
        interval: std::time::Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(interval_secs = interval.as_secs(), "reminder poll loop started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!("reminder cycle failed: {e}");
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        info!("reminder poll loop shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteReminderStore;
    use campus_core::ManualClock;
    use campus_notify::{SqliteNotificationStore, UnconfiguredPush};
    use chrono::{TimeZone, Utc};
    use rusqlite::Connection;

    fn engine(config: &RemindersConfig) -> ReminderEngine {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
        ));
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        let store = Arc::new(SqliteReminderStore::new(conn, Arc::clone(&clock)));
        let inbox = Connection::open_in_memory().unwrap();
        campus_notify::db::init_db(&inbox).unwrap();
        ReminderEngine::new(
            store,
            Arc::new(SqliteNotificationStore::new(inbox)),
            Arc::new(UnconfiguredPush),
            clock,
            config,
        )
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn cycle_future_can_be_spawned() {
        let engine = Arc::new(engine(&RemindersConfig::default()));
        assert_send(&engine.run_cycle());

        let summary = tokio::spawn(async move { engine.run_cycle().await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary, CycleSummary::default());
    }

    #[test]
    fn oversized_lead_window_is_capped() {
        let config = RemindersConfig {
            lead_window_secs: u64::MAX,
            ..RemindersConfig::default()
        };
        assert_eq!(engine(&config).lead_window(), Duration::days(1));
    }
}
