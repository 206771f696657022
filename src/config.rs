//! Compile-time clock configuration.

/// Announcement policy of the clock.
///
/// Both window bounds are inclusive: announcements fire for every hour in
/// `active_start_hour..=active_end_hour`, except that quarter chimes stop
/// one hour early (at `active_end_hour` only the top-of-hour cuckoo plays).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    pub active_start_hour: u8,
    pub active_end_hour: u8,
    /// Minimum time between two announcement triggers.
    pub cooldown_ms: u32,
    /// Play `NIK_<hour>.WAV` before the cuckoo count.
    pub hour_preamble: bool,
}

impl ClockConfig {
    pub const DEFAULT: Self = Self {
        active_start_hour: 8,
        active_end_hour: 21,
        cooldown_ms: 5000,
        hour_preamble: true,
    };

    pub const fn with_window(self, active_start_hour: u8, active_end_hour: u8) -> Self {
        Self {
            active_start_hour,
            active_end_hour,
            ..self
        }
    }

    pub const fn with_cooldown_ms(self, cooldown_ms: u32) -> Self {
        Self {
            cooldown_ms,
            ..self
        }
    }

    pub const fn with_hour_preamble(self, hour_preamble: bool) -> Self {
        Self {
            hour_preamble,
            ..self
        }
    }

    pub const fn is_active(&self, hours: u8) -> bool {
        hours >= self.active_start_hour && hours <= self.active_end_hour
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
