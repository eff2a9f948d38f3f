//! Civil-time source. Components never read the system clock directly.

use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use std::sync::Mutex;

/// Source of the club-local time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in the club's civil timezone.
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// System time shifted into a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Wall clock shifted by `offset`.
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    /// Clock stopped at `now`.
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advances() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 26)
            .unwrap()
            .and_hms_opt(23, 30, 0)
            .unwrap();
        let clock = FixedClock::new(start);
        clock.advance(Duration::hours(1));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 27).unwrap());
    }

    #[test]
    fn test_system_clock_applies_offset() {
        let utc = SystemClock::new(FixedOffset::east_opt(0).unwrap()).now();
        let shifted = SystemClock::new(FixedOffset::east_opt(3 * 3600).unwrap()).now();
        let diff = (shifted - utc).num_minutes();
        assert!((179..=181).contains(&diff));
    }
}
