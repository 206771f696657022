//! Announcement scheduling.

use crate::clip::{Clip, ClipSequence};
use crate::config::ClockConfig;
use crate::sample::{Instant, TimeSample};
use crate::speech::compose_time;

/// What to announce this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Decision {
    None,
    /// Top of the hour: preamble, cuckoo count and spoken time.
    Hourly,
    /// Quarter past, half past, quarter to: chime and spoken time.
    Quarter,
    /// Every five minutes: spoken time only.
    Periodic,
}

impl Decision {
    pub const fn fired(self) -> bool {
        !matches!(self, Decision::None)
    }
}

/// Re-trigger suppression, outlives the tick that fired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CooldownState {
    pub last_trigger: Option<Instant>,
}

impl CooldownState {
    pub const fn new() -> Self {
        Self { last_trigger: None }
    }

    pub const fn ready(&self, now: Instant, cooldown_ms: u32) -> bool {
        match self.last_trigger {
            Some(last) => now.since(last) >= cooldown_ms,
            None => true,
        }
    }
}

pub struct Scheduler {
    config: ClockConfig,
    cooldown: CooldownState,
}

impl Scheduler {
    pub const fn new(config: ClockConfig) -> Self {
        Self {
            config,
            cooldown: CooldownState::new(),
        }
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    pub fn cooldown(&self) -> CooldownState {
        self.cooldown
    }

    /// Decides whether `sample` is an announcement instant.
    ///
    /// Stamps the cooldown before returning a firing decision, so a tick
    /// running during (or right after) playback of the same minute cannot
    /// fire again.
    pub fn decide(&mut self, sample: TimeSample, now: Instant) -> Decision {
        if sample.seconds != 0 || !self.cooldown.ready(now, self.config.cooldown_ms) {
            return Decision::None;
        }

        let decision = Self::policy(&self.config, sample);
        if decision.fired() {
            self.cooldown.last_trigger = Some(now);
            debug!("announcement {} at {}", decision, sample);
        }
        decision
    }

    /// Unscheduled request (button). Subject to the same cooldown.
    pub fn request(&mut self, now: Instant) -> bool {
        if self.cooldown.ready(now, self.config.cooldown_ms) {
            self.cooldown.last_trigger = Some(now);
            true
        } else {
            false
        }
    }

    fn policy(config: &ClockConfig, sample: TimeSample) -> Decision {
        let TimeSample { hours, minutes, .. } = sample;

        if !config.is_active(hours) {
            Decision::None
        } else if minutes == 0 {
            Decision::Hourly
        } else if hours == config.active_end_hour {
            // quiet hours start: only the top-of-hour cuckoo
            Decision::None
        } else if minutes % 15 == 0 {
            Decision::Quarter
        } else if minutes % 5 == 0 {
            Decision::Periodic
        } else {
            Decision::None
        }
    }
}

/// Number of cuckoo calls at the top of `hours`.
pub const fn cuckoo_count(hours: u8) -> u8 {
    if hours <= 12 {
        hours
    } else {
        hours - 12
    }
}

/// Clips for `decision` announced at `sample`.
pub fn announcement(decision: Decision, sample: TimeSample, config: &ClockConfig) -> ClipSequence {
    let mut seq = ClipSequence::new();
    match decision {
        Decision::None => return seq,
        Decision::Hourly => {
            if config.hour_preamble {
                seq.push(Clip::Preamble(sample.hours));
            }
            for _ in 0..cuckoo_count(sample.hours) {
                seq.push(Clip::Cuckoo);
            }
        }
        Decision::Quarter => seq.push(Clip::Chime),
        Decision::Periodic => {}
    }
    seq.extend_from(&compose_time(sample.hours, sample.minutes));
    seq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u8, m: u8) -> TimeSample {
        TimeSample::hm(h, m)
    }

    fn fresh() -> Scheduler {
        Scheduler::new(ClockConfig::DEFAULT)
    }

    #[test]
    fn hourly_wins_over_quarter_and_periodic() {
        assert_eq!(fresh().decide(at(12, 0), Instant(0)), Decision::Hourly);
    }

    #[test]
    fn quarter_and_periodic() {
        assert_eq!(fresh().decide(at(9, 15), Instant(0)), Decision::Quarter);
        assert_eq!(fresh().decide(at(9, 30), Instant(0)), Decision::Quarter);
        assert_eq!(fresh().decide(at(9, 45), Instant(0)), Decision::Quarter);
        assert_eq!(fresh().decide(at(9, 5), Instant(0)), Decision::Periodic);
        assert_eq!(fresh().decide(at(9, 50), Instant(0)), Decision::Periodic);
        assert_eq!(fresh().decide(at(9, 7), Instant(0)), Decision::None);
    }

    #[test]
    fn only_on_minute_boundary() {
        assert_eq!(
            fresh().decide(TimeSample::new(9, 15, 1), Instant(0)),
            Decision::None
        );
    }

    #[test]
    fn window_edges() {
        assert_eq!(fresh().decide(at(21, 15), Instant(0)), Decision::None);
        assert_eq!(fresh().decide(at(21, 0), Instant(0)), Decision::Hourly);
        assert_eq!(fresh().decide(at(21, 10), Instant(0)), Decision::None);
        assert_eq!(fresh().decide(at(20, 55), Instant(0)), Decision::Periodic);
        assert_eq!(fresh().decide(at(22, 0), Instant(0)), Decision::None);
        assert_eq!(fresh().decide(at(7, 0), Instant(0)), Decision::None);
        assert_eq!(fresh().decide(at(8, 0), Instant(0)), Decision::Hourly);

        let mut early = Scheduler::new(ClockConfig::DEFAULT.with_window(7, 21));
        assert_eq!(early.decide(at(7, 0), Instant(0)), Decision::Hourly);
    }

    #[test]
    fn cooldown_suppresses_second_tick() {
        let mut s = fresh();
        assert_eq!(s.decide(at(10, 30), Instant(1000)), Decision::Quarter);
        assert_eq!(s.cooldown().last_trigger, Some(Instant(1000)));
        assert_eq!(s.decide(at(10, 30), Instant(1200)), Decision::None);
        assert_eq!(s.decide(at(10, 30), Instant(5999)), Decision::None);
        assert_eq!(s.decide(at(10, 30), Instant(6000)), Decision::Quarter);
    }

    #[test]
    fn none_leaves_cooldown_alone() {
        let mut s = fresh();
        assert_eq!(s.decide(at(10, 31), Instant(1000)), Decision::None);
        assert_eq!(s.cooldown(), CooldownState::new());
    }

    #[test]
    fn cooldown_across_timer_wrap() {
        let mut s = fresh();
        let t0 = Instant(u32::MAX - 100);
        assert!(s.decide(at(10, 0), t0).fired());
        assert_eq!(s.decide(at(10, 0), t0.add_millis(200)), Decision::None);
        assert!(s.decide(at(10, 5), t0.add_millis(5000)).fired());
    }

    #[test]
    fn request_shares_cooldown() {
        let mut s = fresh();
        assert!(s.request(Instant(0)));
        assert!(!s.request(Instant(100)));
        assert_eq!(s.decide(at(10, 5), Instant(4000)), Decision::None);
        assert_eq!(s.decide(at(10, 5), Instant(5000)), Decision::Periodic);
    }

    #[test]
    fn cuckoo_counts() {
        assert_eq!(cuckoo_count(8), 8);
        assert_eq!(cuckoo_count(12), 12);
        assert_eq!(cuckoo_count(13), 1);
        assert_eq!(cuckoo_count(21), 9);
    }

    #[test]
    fn hourly_clips() {
        let seq = announcement(Decision::Hourly, at(14, 0), &ClockConfig::DEFAULT);
        let mut expected = ClipSequence::new();
        expected.push(Clip::Preamble(14));
        expected.push(Clip::Cuckoo);
        expected.push(Clip::Cuckoo);
        expected.extend_from(&compose_time(14, 0));
        assert_eq!(seq, expected);

        let quiet = ClockConfig::DEFAULT.with_hour_preamble(false);
        let seq = announcement(Decision::Hourly, at(14, 0), &quiet);
        assert_eq!(seq.as_slice()[0], Clip::Cuckoo);
        assert_eq!(seq.len(), 2 + compose_time(14, 0).len());
    }

    #[test]
    fn quarter_and_periodic_clips() {
        let seq = announcement(Decision::Quarter, at(9, 45), &ClockConfig::DEFAULT);
        assert_eq!(seq.as_slice()[0], Clip::Chime);
        assert_eq!(&seq.as_slice()[1..], compose_time(9, 45).as_slice());

        let seq = announcement(Decision::Periodic, at(9, 50), &ClockConfig::DEFAULT);
        assert_eq!(seq, compose_time(9, 50));

        assert!(announcement(Decision::None, at(9, 51), &ClockConfig::DEFAULT).is_empty());
    }

    #[test]
    fn longest_announcement_fits() {
        let cfg = ClockConfig::DEFAULT.with_window(0, 23);
        let seq = announcement(Decision::Hourly, at(12, 0), &cfg);
        // preamble, 12 calls, "12 HOURS", "0 MINUTES"
        assert_eq!(seq.len(), 1 + 12 + 2 + 2);
    }
}
