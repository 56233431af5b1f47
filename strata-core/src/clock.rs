//! Wall-clock abstraction.
//!
//! The cache never reads the system time directly; it asks a [`Clock`].
//! Production code uses [`SystemClock`], tests drive a [`ManualClock`].

use crate::constants::BUCKET_SCALE_MS;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Clock backed by the system UTC time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.advance_millis(minutes * BUCKET_SCALE_MS);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Collapse a millisecond timestamp into its one-minute bucket slot.
pub fn shrink_time(millis: i64) -> i64 {
    millis.div_euclid(BUCKET_SCALE_MS)
}

/// Render a millisecond duration as `[-][<d>D][<h>H][<m>M]<s>.<ms>S`.
///
/// Larger units only appear once the duration exceeds them, so a
/// ninety-second age reads `1M30.0S` and a three-second age reads `3.0S`.
pub fn format_age(diff_millis: i64) -> String {
    let minus = if diff_millis < 0 { "-" } else { "" };
    let diff = diff_millis.unsigned_abs();

    let millis = diff % 1000;
    let mut seconds = diff / 1000;
    let (mut days, mut hours, mut minutes) = (None, None, None);

    if seconds > 60 {
        let mut m = seconds / 60;
        seconds -= m * 60;
        if m > 60 {
            let mut h = m / 60;
            m -= h * 60;
            if h > 24 {
                let d = h / 24;
                h -= d * 24;
                days = Some(d);
            }
            hours = Some(h);
        }
        minutes = Some(m);
    }

    let mut out = String::from(minus);
    if let Some(d) = days {
        out.push_str(&format!("{d}D"));
    }
    if let Some(h) = hours {
        out.push_str(&format!("{h}H"));
    }
    if let Some(m) = minutes {
        out.push_str(&format!("{m}M"));
    }
    out.push_str(&format!("{seconds}.{millis}S"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.advance_millis(500);
        assert_eq!(clock.now_millis(), 1_500);
        clock.advance_minutes(2);
        assert_eq!(clock.now_millis(), 121_500);
        clock.set(0);
        assert_eq!(clock.now_millis(), 0);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_shrink_time_minute_resolution() {
        assert_eq!(shrink_time(0), 0);
        assert_eq!(shrink_time(59_999), 0);
        assert_eq!(shrink_time(60_000), 1);
        assert_eq!(shrink_time(-1), -1);
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(3_250), "3.250S");
        assert_eq!(format_age(90_000), "1M30.0S");
        assert_eq!(format_age(2 * 3_600_000 + 5 * 60_000 + 7_000), "2H5M7.0S");
        assert_eq!(format_age(3 * 86_400_000 + 3_600_000 + 61_000), "3D1H1M1.0S");
        assert_eq!(format_age(-3_000), "-3.0S");
    }
}
