use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ReminderError, Result};

/// Which way along the route the rider is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Direction {
    Outbound = 0,
    Return = 1,
}

#[derive(Debug, Error)]
#[error("invalid direction {0}: expected 0 (outbound) or 1 (return)")]
pub struct InvalidDirection(pub i64);

impl Direction {
    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for Direction {
    type Error = InvalidDirection;

    fn try_from(v: i64) -> std::result::Result<Self, Self::Error> {
        match v {
            0 => Ok(Direction::Outbound),
            1 => Ok(Direction::Return),
            other => Err(InvalidDirection(other)),
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = InvalidDirection;

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        Direction::try_from(v as i64)
    }
}

impl From<Direction> for u8 {
    fn from(d: Direction) -> u8 {
        d as u8
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Outbound => write!(f, "outbound"),
            Direction::Return => write!(f, "return"),
        }
    }
}

/// Reminder creation request as received from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReminder {
    pub user_id: String,
    pub stop_id: String,
    pub stop_name: String,
    pub route_id: String,
    pub route_name: String,
    /// Raw direction; validated into [`Direction`].
    pub direction: i64,
    pub estimated_seconds_to_arrival: i64,
}

impl NewReminder {
    /// Check every field and, given the lead window and the current instant,
    /// produce the record the store should insert.
    pub fn into_draft(self, now: DateTime<Utc>, lead_window: Duration) -> Result<ReminderDraft> {
        for (field, value) in [
            ("userId", &self.user_id),
            ("stopId", &self.stop_id),
            ("stopName", &self.stop_name),
            ("routeId", &self.route_id),
            ("routeName", &self.route_name),
        ] {
            if value.trim().is_empty() {
                return Err(ReminderError::Validation(format!("'{field}' is required")));
            }
        }
        let direction = Direction::try_from(self.direction)
            .map_err(|e| ReminderError::Validation(e.to_string()))?;
        if !(1..=MAX_ESTIMATE_SECS).contains(&self.estimated_seconds_to_arrival) {
            return Err(ReminderError::Validation(format!(
                "'estimatedSecondsToArrival' must be between 1 and {MAX_ESTIMATE_SECS} seconds"
            )));
        }

        let (target_arrival_time, reminder_time) =
            schedule(now, self.estimated_seconds_to_arrival, lead_window).ok_or_else(|| {
                ReminderError::Validation("arrival time is out of range".to_string())
            })?;

        Ok(ReminderDraft {
            user_id: self.user_id,
            stop_id: self.stop_id,
            stop_name: self.stop_name,
            route_id: self.route_id,
            route_name: self.route_name,
            direction,
            target_arrival_time,
            reminder_time,
        })
    }
}

/// Longest accepted estimate. Anything further out is not a bus on its way.
pub const MAX_ESTIMATE_SECS: i64 = 24 * 60 * 60;

/// Compute `(target_arrival_time, reminder_time)` for an estimate taken at `now`.
///
/// `reminder_time` is `target - lead_window`, clamped to `now` when the bus is
/// already closer than the lead window. The clamp keeps
/// `reminder_time <= target_arrival_time` for any positive estimate and makes
/// such a reminder due on the very next cycle.
///
/// `None` when the arithmetic leaves chrono's representable range.
pub fn schedule(
    now: DateTime<Utc>,
    estimated_seconds: i64,
    lead_window: Duration,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let target = now.checked_add_signed(Duration::try_seconds(estimated_seconds)?)?;
    let reminder = target
        .checked_sub_signed(lead_window)
        .map_or(now, |at| at.max(now));
    Some((target, reminder))
}

/// A validated reminder ready for insertion. The store assigns the ID and
/// bookkeeping timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderDraft {
    pub user_id: String,
    pub stop_id: String,
    pub stop_name: String,
    pub route_id: String,
    pub route_name: String,
    pub direction: Direction,
    pub target_arrival_time: DateTime<Utc>,
    pub reminder_time: DateTime<Utc>,
}

/// A persisted reminder record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    /// UUIDv7 string, primary key.
    pub id: String,
    pub user_id: String,
    pub stop_id: String,
    pub stop_name: String,
    pub route_id: String,
    pub route_name: String,
    pub direction: Direction,
    /// When the bus is expected at the stop.
    pub target_arrival_time: DateTime<Utc>,
    /// When the reminder becomes due.
    pub reminder_time: DateTime<Utc>,
    /// Cleared once by the sweeper after the arrival time passes.
    pub is_active: bool,
    /// Set once by whichever dispatcher wins the claim.
    pub is_notified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate outcome of one `run_cycle` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Candidates returned by the scan.
    pub scanned: usize,
    /// Claims won that produced a notification.
    pub notified: usize,
    /// Claims won for reminders whose bus had already arrived (no notification).
    pub retired: usize,
    /// Candidates left alone: claim lost to another cycle, or no longer due.
    pub skipped: usize,
    /// Reminders deactivated by the sweep.
    pub expired: usize,
    /// Candidates whose processing failed.
    pub errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn request(direction: i64, secs: i64) -> NewReminder {
        NewReminder {
            user_id: "u1".into(),
            stop_id: "S1".into(),
            stop_name: "Main Gate".into(),
            route_id: "R1".into(),
            route_name: "Route 1".into(),
            direction,
            estimated_seconds_to_arrival: secs,
        }
    }

    #[test]
    fn schedule_subtracts_lead_window() {
        let draft = request(0, 600)
            .into_draft(t0(), Duration::seconds(300))
            .unwrap();
        assert_eq!(draft.target_arrival_time, t0() + Duration::seconds(600));
        assert_eq!(draft.reminder_time, t0() + Duration::seconds(300));
        assert_eq!(draft.direction, Direction::Outbound);
    }

    #[test]
    fn schedule_clamps_short_estimates_to_now() {
        let (target, reminder) = schedule(t0(), 120, Duration::seconds(300)).unwrap();
        assert_eq!(target, t0() + Duration::seconds(120));
        assert_eq!(reminder, t0());
        assert!(reminder <= target);
    }

    #[test]
    fn rejects_invalid_direction() {
        let err = request(2, 600)
            .into_draft(t0(), Duration::seconds(300))
            .unwrap_err();
        assert!(matches!(err, ReminderError::Validation(_)));
    }

    #[test]
    fn rejects_non_positive_estimate() {
        for secs in [0, -30] {
            let err = request(1, secs)
                .into_draft(t0(), Duration::seconds(300))
                .unwrap_err();
            assert!(matches!(err, ReminderError::Validation(_)));
        }
    }

    #[test]
    fn rejects_estimates_beyond_a_day() {
        for secs in [MAX_ESTIMATE_SECS + 1, 300_000_000_000, i64::MAX] {
            let err = request(0, secs)
                .into_draft(t0(), Duration::seconds(300))
                .unwrap_err();
            assert!(matches!(err, ReminderError::Validation(_)), "{secs}: {err}");
        }
        let draft = request(0, MAX_ESTIMATE_SECS)
            .into_draft(t0(), Duration::seconds(300))
            .unwrap();
        assert_eq!(draft.target_arrival_time, t0() + Duration::days(1));
    }

    #[test]
    fn schedule_never_panics_on_extreme_input() {
        assert_eq!(schedule(t0(), i64::MAX, Duration::seconds(300)), None);
        assert_eq!(schedule(DateTime::<Utc>::MAX_UTC, 60, Duration::seconds(300)), None);
    }

    #[test]
    fn rejects_blank_identifiers() {
        let mut req = request(0, 600);
        req.stop_id = "  ".into();
        let err = req.into_draft(t0(), Duration::seconds(300)).unwrap_err();
        assert!(err.to_string().contains("stopId"));
    }

    #[test]
    fn direction_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Direction::Return).unwrap(), "1");
        let d: Direction = serde_json::from_str("0").unwrap();
        assert_eq!(d, Direction::Outbound);
        assert!(serde_json::from_str::<Direction>("3").is_err());
    }
}
