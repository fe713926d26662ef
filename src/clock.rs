//! Injectable time source for the decider.
//!
//! Commands are stamped with "now" at decide time, so the clock is an
//! explicit capability handed to the command service rather than ambient
//! global time. Tests use [`ManualClock`] to advance time deterministically
//! without cross-test interference.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, Local};

/// A monotonic source of "now".
///
/// Instants carry a fixed UTC offset so that downstream period-window
/// computation happens in the zone the instant was observed in.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall-clock time in the local zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock that only moves when told to.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use ledgerfold::{Clock, ManualClock};
///
/// let start = Utc.with_ymd_and_hms(2019, 5, 3, 12, 20, 30).unwrap().fixed_offset();
/// let clock = ManualClock::new(start);
/// clock.advance(Duration::hours(24));
/// assert_eq!(clock.now(), start + Duration::hours(24));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    /// Create a clock frozen at the given instant.
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by the given duration.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += by;
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, to: DateTime<FixedOffset>) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn start() -> DateTime<FixedOffset> {
        Utc.with_ymd_and_hms(2019, 5, 3, 12, 20, 30)
            .unwrap()
            .fixed_offset()
    }

    #[test]
    fn manual_clock_is_frozen_until_advanced() {
        let clock = ManualClock::new(start());
        assert_eq!(clock.now(), start());
        assert_eq!(clock.now(), start());
    }

    #[test]
    fn advance_moves_now_forward() {
        let clock = ManualClock::new(start());
        clock.advance(Duration::minutes(1));
        assert_eq!(clock.now(), start() + Duration::minutes(1));
        clock.advance(Duration::hours(24));
        assert_eq!(
            clock.now(),
            start() + Duration::minutes(1) + Duration::hours(24)
        );
    }

    #[test]
    fn set_jumps_to_absolute_instant() {
        let clock = ManualClock::new(start());
        let later = Utc
            .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
            .unwrap()
            .fixed_offset();
        clock.set(later);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn system_clock_preserves_local_offset() {
        let now = SystemClock.now();
        assert_eq!(now.offset(), Local::now().offset());
    }
}
