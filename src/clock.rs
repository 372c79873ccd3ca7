//! Time source and elapsed-time threshold policy.
//!
//! Everything time-driven in this crate (the auto-cancel job, the session
//! monitor) reads the current time through the [`Clock`] trait so tests can
//! pin it exactly.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Returns true when `created_at` is strictly older than `threshold` as of
/// `now`. Equality to the threshold does not qualify.
pub fn age_exceeds(created_at: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    now - created_at > threshold
}

/// A substitutable source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Test use only, but lives here so
/// integration tests can reach it.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_age_exceeds_strictly_after_threshold() {
        let created = base();
        let threshold = Duration::hours(1);

        assert!(age_exceeds(
            created,
            created + Duration::hours(1) + Duration::seconds(1),
            threshold
        ));
        assert!(age_exceeds(created, created + Duration::hours(2), threshold));
    }

    #[test]
    fn test_age_exceeds_boundary_is_exclusive() {
        let created = base();
        let threshold = Duration::hours(1);

        // Exactly one hour old does not qualify.
        assert!(!age_exceeds(created, created + Duration::hours(1), threshold));
    }

    #[test]
    fn test_age_exceeds_younger_than_threshold() {
        let created = base();
        let threshold = Duration::hours(1);

        assert!(!age_exceeds(
            created,
            created + Duration::minutes(30),
            threshold
        ));
        assert!(!age_exceeds(created, created, threshold));
    }

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(base());
        assert_eq!(clock.now(), base());

        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), base() + Duration::minutes(5));

        clock.set(base());
        assert_eq!(clock.now(), base());
    }
}
