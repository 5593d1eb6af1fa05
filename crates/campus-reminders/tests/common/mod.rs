#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use campus_core::{config::RemindersConfig, Clock, ManualClock};
use campus_notify::{
    NewNotification, Notification, NotificationSink, NotifyError, PushChannel, PushPayload,
    SqliteNotificationStore,
};
use campus_reminders::{NewReminder, ReminderEngine, SqliteReminderStore};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::Connection;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

pub fn test_config() -> RemindersConfig {
    RemindersConfig {
        lead_window_secs: 300,
        poll_interval_secs: 0,
        max_concurrency: 4,
        notify_attempts: 3,
        notify_backoff_ms: 0,
        push_timeout_ms: 50,
    }
}

pub fn request(user: &str, stop: &str, route: &str, direction: i64, secs: i64) -> NewReminder {
    NewReminder {
        user_id: user.to_string(),
        stop_id: stop.to_string(),
        stop_name: format!("Stop {stop}"),
        route_id: route.to_string(),
        route_name: format!("Route {route}"),
        direction,
        estimated_seconds_to_arrival: secs,
    }
}

/// Notification sink over an in-memory SQLite inbox that can be told to fail.
pub struct FlakySink {
    pub inner: SqliteNotificationStore,
    fail_next: AtomicU32,
    always_fail_user: Option<String>,
}

impl FlakySink {
    pub fn new(fail_next: u32, always_fail_user: Option<&str>) -> Self {
        let conn = Connection::open_in_memory().unwrap();
        campus_notify::db::init_db(&conn).unwrap();
        Self {
            inner: SqliteNotificationStore::new(conn),
            fail_next: AtomicU32::new(fail_next),
            always_fail_user: always_fail_user.map(String::from),
        }
    }

    pub fn count_for(&self, reminder_id: &str) -> usize {
        self.inner.count_for_related(reminder_id).unwrap()
    }
}

#[async_trait]
impl NotificationSink for FlakySink {
    async fn create(&self, new: NewNotification) -> Result<Notification, NotifyError> {
        if self.always_fail_user.as_deref() == Some(new.user_id.as_str()) {
            return Err(NotifyError::LockPoisoned);
        }
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(NotifyError::LockPoisoned);
        }
        self.inner.create(new).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMode {
    Ok,
    Fail,
    Hang,
    /// Hang for this user only; everyone else succeeds.
    HangFor(&'static str),
}

/// Push channel that records every attempt.
pub struct RecordingPush {
    mode: PushMode,
    pub attempts: Mutex<Vec<(String, PushPayload)>>,
}

impl RecordingPush {
    pub fn new(mode: PushMode) -> Self {
        Self {
            mode,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl PushChannel for RecordingPush {
    async fn push(&self, user_id: &str, payload: &PushPayload) -> Result<(), NotifyError> {
        self.attempts
            .lock()
            .unwrap()
            .push((user_id.to_string(), payload.clone()));
        match self.mode {
            PushMode::Ok => Ok(()),
            PushMode::Fail => Err(NotifyError::Push("provider returned 503".into())),
            PushMode::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                Ok(())
            }
            PushMode::HangFor(slow) if slow == user_id => {
                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                Ok(())
            }
            PushMode::HangFor(_) => Ok(()),
        }
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<SqliteReminderStore>,
    pub sink: Arc<FlakySink>,
    pub push: Arc<RecordingPush>,
    pub engine: Arc<ReminderEngine>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(PushMode::Ok, FlakySink::new(0, None))
    }

    pub fn with(push_mode: PushMode, sink: FlakySink) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let conn = Connection::open_in_memory().unwrap();
        campus_reminders::db::init_db(&conn).unwrap();
        let store = Arc::new(SqliteReminderStore::new(conn, clock.clone() as Arc<dyn Clock>));
        let sink = Arc::new(sink);
        let push = Arc::new(RecordingPush::new(push_mode));
        let engine = Arc::new(ReminderEngine::new(
            store.clone(),
            sink.clone(),
            push.clone(),
            clock.clone(),
            &test_config(),
        ));
        Self {
            clock,
            store,
            sink,
            push,
            engine,
        }
    }

    /// Move the clock to `secs` seconds after T0.
    pub fn at(&self, secs: i64) {
        self.clock.set(t0() + Duration::seconds(secs));
    }
}
