//! Time sources for reference generation.

use std::sync::Mutex;

use chrono::{Local, NaiveDateTime, SubsecRound, TimeDelta};

/// Supplies the local wall-clock time at second resolution.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The machine's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local().trunc_subsecs(0)
    }
}

/// A clock that only moves when told to.
///
/// Used to replay a fixed second in tests and tooling.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now.trunc_subsecs(0)),
        }
    }

    /// Jumps to `now`.
    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now.trunc_subsecs(0);
    }

    /// Moves forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn test_system_clock_has_no_subseconds() {
        assert_eq!(SystemClock.now().nanosecond(), 0);
    }

    #[test]
    fn test_manual_clock_advance() {
        let start = NaiveDate::from_ymd_opt(2025, 9, 2)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let clock = ManualClock::new(start);
        clock.advance(TimeDelta::seconds(1));
        assert_eq!(
            clock.now(),
            NaiveDate::from_ymd_opt(2025, 9, 3)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }
}
