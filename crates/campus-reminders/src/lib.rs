//! `campus-reminders` — bus-arrival reminders that fire exactly once.
//!
//! # Overview
//!
//! Reminders are persisted to a SQLite `reminders` table. Each call to
//! [`engine::ReminderEngine::run_cycle`] scans for due reminders, claims each
//! one with a single conditional `UPDATE`, writes a durable notification for
//! the claims it won, fires a best-effort realtime push, and finally sweeps
//! reminders whose bus has already arrived.
//!
//! Any number of callers may run cycles at the same time (the in-process poll
//! loop, a platform cron hitting the HTTP trigger, an operator doing it by
//! hand). The claim is the only synchronisation: whoever flips `is_notified`
//! first sends the notification, everyone else does nothing.
//!
//! # Reminder lifecycle
//!
//! | State    | `is_active` | `is_notified` | Left by                                 |
//! |----------|-------------|---------------|-----------------------------------------|
//! | Pending  | 1           | 0             | claim (notify or silent retire), sweep  |
//! | Notified | 1           | 1             | sweep                                   |
//! | Expired  | 0           | any           | owner delete only                       |

pub mod db;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod scanner;
pub mod store;
pub mod sweeper;
pub mod types;

pub use dispatcher::{DispatchOutcome, DispatchPolicy, Dispatcher};
pub use engine::ReminderEngine;
pub use error::{ReminderError, Result};
pub use store::{ReminderStore, SqliteReminderStore};
pub use types::{CycleSummary, Direction, NewReminder, Reminder, ReminderDraft};
