//! Wall-clock abstraction and the canonical timestamp encoding used in SQLite.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Source of "now" for anything that makes time-based decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real UTC wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used by tests and replay tooling.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Encode an instant for storage.
///
/// Fixed-width RFC 3339 (millisecond precision, `Z` suffix) so that SQL string
/// comparison orders the same way as the instants themselves.
pub fn to_db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a stored timestamp. Accepts any RFC 3339 offset.
pub fn from_db_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn db_timestamps_sort_chronologically() {
        let a = Utc.with_ymd_and_hms(2026, 3, 1, 9, 59, 59).unwrap();
        let b = a + Duration::milliseconds(1);
        let c = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let (sa, sb, sc) = (to_db_timestamp(a), to_db_timestamp(b), to_db_timestamp(c));
        assert!(sa < sb && sb < sc);
        assert_eq!(sa.len(), sc.len());
    }

    #[test]
    fn db_timestamp_round_trips_at_millisecond_precision() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap() + Duration::milliseconds(250);
        assert_eq!(from_db_timestamp(&to_db_timestamp(at)), Some(at));
        assert_eq!(from_db_timestamp("not a time"), None);
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::seconds(301));
        assert_eq!(clock.now(), start + Duration::seconds(301));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
