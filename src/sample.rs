//! Values sampled once per control-loop tick.

use core::fmt;

/// Wall-clock reading taken from the RTC at the start of a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeSample {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl TimeSample {
    pub const fn new(hours: u8, minutes: u8, seconds: u8) -> Self {
        Self {
            hours,
            minutes,
            seconds,
        }
    }

    /// Same hour and minute, seconds zeroed.
    pub const fn hm(hours: u8, minutes: u8) -> Self {
        Self::new(hours, minutes, 0)
    }

    pub const fn is_valid(&self) -> bool {
        self.hours < 24 && self.minutes < 60 && self.seconds < 60
    }

    pub fn to_time(self) -> Option<time::Time> {
        time::Time::from_hms(self.hours, self.minutes, self.seconds).ok()
    }
}

impl From<time::Time> for TimeSample {
    fn from(t: time::Time) -> Self {
        let (hours, minutes, seconds) = t.as_hms();
        Self::new(hours, minutes, seconds)
    }
}

impl fmt::Display for TimeSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Monotonic millisecond timestamp.
///
/// Wraps after ~49 days; differences are computed with wrapping
/// arithmetic so intervals stay correct across the wrap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Instant(pub u32);

impl Instant {
    pub const fn from_millis(ms: u32) -> Self {
        Self(ms)
    }

    pub const fn millis(self) -> u32 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`.
    pub const fn since(self, earlier: Instant) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    pub const fn add_millis(self, ms: u32) -> Self {
        Self(self.0.wrapping_add(ms))
    }
}

/// Millisecond clock accumulated from a wrapping hardware tick counter.
///
/// Must be advanced more often than the counter wraps. The sub-millisecond
/// remainder is carried over, so the clock does not drift.
#[derive(Clone, Copy, Debug, Default)]
pub struct Uptime {
    last_ticks: u32,
    now: Instant,
}

impl Uptime {
    pub const fn new() -> Self {
        Self {
            last_ticks: 0,
            now: Instant(0),
        }
    }

    pub fn advance(&mut self, ticks: u32, ticks_per_ms: u32) -> Instant {
        let elapsed = ticks.wrapping_sub(self.last_ticks) / ticks_per_ms;
        self.last_ticks = self.last_ticks.wrapping_add(elapsed * ticks_per_ms);
        self.now = self.now.add_millis(elapsed);
        self.now
    }
}

/// Temperature in tenths of a degree Celsius.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Temperature(pub i16);

impl Temperature {
    /// From the DS3231 quarter-degree resolution.
    pub const fn from_quarters(q: i16) -> Self {
        Self(q * 10 / 4)
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { '-' } else { '+' };
        let t = self.0.unsigned_abs();
        write!(f, "{}{}.{}C", sign, t / 10, t % 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::time;

    #[test]
    fn sample_from_time() {
        let s = TimeSample::from(time!(13:45:07));
        assert_eq!(s, TimeSample::new(13, 45, 7));
        assert_eq!(s.to_time(), Some(time!(13:45:07)));
        assert!(TimeSample::new(24, 0, 0).to_time().is_none());
        assert!(!TimeSample::new(23, 60, 0).is_valid());
    }

    #[test]
    fn uptime_carries_remainder_and_counter_wraps() {
        const TICKS_PER_MS: u32 = 72_000;
        let mut uptime = Uptime::new();
        assert_eq!(uptime.advance(TICKS_PER_MS - 1, TICKS_PER_MS), Instant(0));

        // 50M ticks between polls, well past several counter wraps
        let mut total = u64::from(TICKS_PER_MS - 1);
        for _ in 0..300 {
            total += 50_000_000;
            let now = uptime.advance(total as u32, TICKS_PER_MS);
            assert_eq!(u64::from(now.millis()), total / u64::from(TICKS_PER_MS));
        }
        assert!(total > 3 * u64::from(u32::MAX));
    }

    #[test]
    fn instant_difference_wraps() {
        let before = Instant::from_millis(u32::MAX - 999);
        let after = before.add_millis(3000);
        assert_eq!(after.millis(), 2000);
        assert_eq!(after.since(before), 3000);
    }

    #[test]
    fn temperature_quarters() {
        assert_eq!(Temperature::from_quarters(94), Temperature(235));
        assert_eq!(Temperature::from_quarters(-3), Temperature(-7));
    }
}
