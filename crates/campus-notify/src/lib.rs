//! `campus-notify` — the durable Notification inbox and the realtime push
//! channel, as seen by producers.
//!
//! Producers only ever *create* notifications ([`NotificationSink`]) and fire
//! realtime pushes ([`PushChannel`]). Reading and marking notifications is the
//! inbox feature's business and lives elsewhere.

pub mod db;
pub mod error;
pub mod push;
pub mod store;
pub mod types;

pub use error::{NotifyError, Result};
pub use push::{HttpPush, PushChannel, UnconfiguredPush};
pub use store::{NotificationSink, SqliteNotificationStore};
pub use types::{NewNotification, Notification, PushPayload, BUS_ARRIVAL};
