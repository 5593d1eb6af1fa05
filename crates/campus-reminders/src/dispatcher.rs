use std::sync::Arc;
use std::time::Duration as StdDuration;

use campus_core::{config::RemindersConfig, Clock};
use campus_notify::{
    NewNotification, Notification, NotificationSink, NotifyError, PushChannel, PushPayload,
    BUS_ARRIVAL,
};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::types::Reminder;

/// Realtime event name for bus-arrival notifications.
pub const PUSH_EVENT: &str = "bus-arrival";

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Claim won, notification persisted (push attempted).
    Notified,
    /// Claim won after the bus had already arrived; no notification sent.
    Retired,
    /// Another cycle claimed it first, or it vanished (deleted / swept).
    ClaimLost,
    /// No longer due at processing time; left for a later cycle.
    NotDue,
    /// Claim could not be attempted, or the notification could not be stored.
    Failed(String),
}

/// Where a candidate stands relative to a fresh clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `target_arrival_time <= now`: the lead window was missed.
    Arrived,
    /// Due and the bus is still `remaining` away.
    Approaching { remaining: Duration },
    /// `reminder_time > now` (e.g. clock skew between workers).
    NotYetDue,
}

pub fn classify(reminder: &Reminder, now: DateTime<Utc>) -> Phase {
    let remaining = reminder.target_arrival_time - now;
    if remaining <= Duration::zero() {
        Phase::Arrived
    } else if reminder.reminder_time <= now {
        Phase::Approaching { remaining }
    } else {
        Phase::NotYetDue
    }
}

/// Whole minutes until arrival, never negative.
pub fn estimated_minutes(remaining: Duration) -> i64 {
    (remaining.num_seconds() / 60).max(0)
}

/// Inbox record for a reminder that is `remaining` away from arrival.
pub fn build_notification(reminder: &Reminder, remaining: Duration) -> NewNotification {
    let minutes = estimated_minutes(remaining);
    let eta = match minutes {
        0 => "in less than a minute".to_string(),
        1 => "in about 1 minute".to_string(),
        n => format!("in about {n} minutes"),
    };
    NewNotification {
        user_id: reminder.user_id.clone(),
        kind: BUS_ARRIVAL.to_string(),
        title: format!("{} is arriving soon", reminder.route_name),
        content: format!(
            "{} ({}) will arrive at {} {}.",
            reminder.route_name, reminder.direction, reminder.stop_name, eta
        ),
        related_id: Some(reminder.id.clone()),
    }
}

/// Retry and timeout knobs for the two outbound calls.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    pub notify_attempts: u32,
    pub notify_backoff: StdDuration,
    pub push_timeout: StdDuration,
}

impl From<&RemindersConfig> for DispatchPolicy {
    fn from(cfg: &RemindersConfig) -> Self {
        Self {
            notify_attempts: cfg.notify_attempts.max(1),
            notify_backoff: StdDuration::from_millis(cfg.notify_backoff_ms),
            push_timeout: StdDuration::from_millis(cfg.push_timeout_ms),
        }
    }
}

/// Claim-then-notify for a single candidate.
///
/// The claim always happens before any side effect, so a reminder produces at
/// most one notification no matter how many dispatchers see it.
pub struct Dispatcher {
    store: Arc<dyn crate::store::ReminderStore>,
    notifications: Arc<dyn NotificationSink>,
    push: Arc<dyn PushChannel>,
    clock: Arc<dyn Clock>,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn crate::store::ReminderStore>,
        notifications: Arc<dyn NotificationSink>,
        push: Arc<dyn PushChannel>,
        clock: Arc<dyn Clock>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            store,
            notifications,
            push,
            clock,
            policy,
        }
    }

    #[instrument(skip(self, reminder), fields(reminder_id = %reminder.id, user_id = %reminder.user_id))]
    pub async fn dispatch(&self, reminder: &Reminder) -> DispatchOutcome {
        let remaining = match classify(reminder, self.clock.now()) {
            Phase::NotYetDue => {
                debug!("candidate no longer due; leaving for a later cycle");
                return DispatchOutcome::NotDue;
            }
            Phase::Arrived => {
                return match self.claim(reminder) {
                    Ok(true) => {
                        info!("bus already arrived; reminder retired without notification");
                        DispatchOutcome::Retired
                    }
                    Ok(false) => DispatchOutcome::ClaimLost,
                    Err(outcome) => outcome,
                };
            }
            Phase::Approaching { remaining } => remaining,
        };

        match self.claim(reminder) {
            Ok(true) => {}
            Ok(false) => return DispatchOutcome::ClaimLost,
            Err(outcome) => return outcome,
        }

        let new = build_notification(reminder, remaining);
        let notification = match self.persist_with_retry(new).await {
            Ok(n) => n,
            Err(e) => {
                // The claim is already committed; this reminder will not be retried.
                error!(error = %e, "notification could not be stored after claim");
                return DispatchOutcome::Failed(format!("notification persist failed: {e}"));
            }
        };
        info!(
            notification_id = %notification.id,
            minutes = estimated_minutes(remaining),
            "bus arrival notification created"
        );

        self.push_best_effort(&reminder.user_id, &notification).await;
        DispatchOutcome::Notified
    }

    /// `Err` carries the outcome to report when the store itself failed.
    fn claim(&self, reminder: &Reminder) -> Result<bool, DispatchOutcome> {
        match self.store.claim_for_notification(&reminder.id) {
            Ok(true) => Ok(true),
            Ok(false) => {
                debug!("claim lost to another dispatcher");
                Ok(false)
            }
            Err(e) => {
                error!(error = %e, "claim failed");
                Err(DispatchOutcome::Failed(format!("claim failed: {e}")))
            }
        }
    }

    async fn persist_with_retry(&self, new: NewNotification) -> Result<Notification, NotifyError> {
        let attempts = self.policy.notify_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.notifications.create(new.clone()).await {
                Ok(n) => return Ok(n),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    warn!(attempt, max = attempts, error = %e, "notification create failed; retrying");
                    tokio::time::sleep(self.policy.notify_backoff * attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn push_best_effort(&self, user_id: &str, notification: &Notification) {
        let payload = PushPayload::for_notification(PUSH_EVENT, notification);
        match tokio::time::timeout(self.policy.push_timeout, self.push.push(user_id, &payload)).await
        {
            Ok(Ok(())) => debug!("realtime push sent"),
            Ok(Err(e)) => warn!(error = %e, "realtime push failed; notification is still stored"),
            Err(_) => warn!(
                timeout_ms = self.policy.push_timeout.as_millis() as u64,
                "realtime push timed out; notification is still stored"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn reminder() -> Reminder {
        Reminder {
            id: "r1".into(),
            user_id: "u1".into(),
            stop_id: "S1".into(),
            stop_name: "Main Gate".into(),
            route_id: "R1".into(),
            route_name: "Route 1".into(),
            direction: Direction::Return,
            target_arrival_time: t0() + Duration::seconds(600),
            reminder_time: t0() + Duration::seconds(300),
            is_active: true,
            is_notified: false,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    #[test]
    fn classify_covers_all_phases() {
        let r = reminder();
        assert_eq!(classify(&r, t0() + Duration::seconds(299)), Phase::NotYetDue);
        assert_eq!(
            classify(&r, t0() + Duration::seconds(301)),
            Phase::Approaching {
                remaining: Duration::seconds(299)
            }
        );
        assert_eq!(classify(&r, t0() + Duration::seconds(600)), Phase::Arrived);
        assert_eq!(classify(&r, t0() + Duration::seconds(900)), Phase::Arrived);
    }

    #[test]
    fn minutes_are_floored_and_never_negative() {
        assert_eq!(estimated_minutes(Duration::seconds(299)), 4);
        assert_eq!(estimated_minutes(Duration::seconds(300)), 5);
        assert_eq!(estimated_minutes(Duration::seconds(59)), 0);
        assert_eq!(estimated_minutes(Duration::seconds(-5)), 0);
    }

    #[test]
    fn notification_mentions_route_stop_direction_and_minutes() {
        let n = build_notification(&reminder(), Duration::seconds(299));
        assert_eq!(n.kind, BUS_ARRIVAL);
        assert_eq!(n.user_id, "u1");
        assert_eq!(n.related_id.as_deref(), Some("r1"));
        assert!(n.content.contains("Route 1"));
        assert!(n.content.contains("Main Gate"));
        assert!(n.content.contains("return"));
        assert!(n.content.contains("4 minutes"));
    }

    #[test]
    fn notification_under_a_minute() {
        let n = build_notification(&reminder(), Duration::seconds(30));
        assert!(n.content.contains("less than a minute"));
    }
}
