//! Control-loop context.
//!
//! Everything that has to survive from one tick to the next lives in
//! [`ClockContext`]: the scheduler cooldown, the display mode with the
//! time being edited, the last rendered second and the last playback
//! fault. The firmware owns one instance in its control task.

use crate::button::{Button, Gesture};
use crate::clip::{Clip, ClipSequence};
use crate::config::ClockConfig;
use crate::display::{fault_text, Field, Surface};
use crate::playback::{play_sequence, ClipError, ClipPlayer, PlaybackObserver, PlaybackReport};
use crate::sample::{Instant, Temperature, TimeSample};
use crate::scheduler::{announcement, Decision, Scheduler};
use crate::speech::compose_time;

/// How long a playback fault replaces the clock.
pub const FAULT_DISPLAY_MS: u32 = 2000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Clock,
    SetHours,
    SetMinutes,
}

/// What the firmware has to do after a gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    None,
    /// Write the edited time to the RTC.
    SetTime(TimeSample),
    /// Speak the current time now.
    Announce,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Fault {
    clip: Clip,
    error: ClipError,
    /// Set by the first render after playback, which may have taken
    /// longer than the display window.
    shown_since: Option<Instant>,
}

impl PlaybackObserver for Option<Fault> {
    fn skipped(&mut self, clip: &Clip, error: ClipError) {
        *self = Some(Fault {
            clip: *clip,
            error,
            shown_since: None,
        });
    }
}

pub struct ClockContext {
    scheduler: Scheduler,
    mode: Mode,
    draft: TimeSample,
    last_second: Option<u8>,
    fault: Option<Fault>,
}

impl ClockContext {
    pub const fn new(config: ClockConfig) -> Self {
        Self {
            scheduler: Scheduler::new(config),
            mode: Mode::Clock,
            draft: TimeSample::new(0, 0, 0),
            last_second: None,
            fault: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn draft(&self) -> TimeSample {
        self.draft
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Runs the announcement pipeline for this tick. Blocks for the
    /// whole playback when an announcement fires.
    pub fn tick<P>(
        &mut self,
        sample: TimeSample,
        now: Instant,
        player: &mut P,
    ) -> Option<PlaybackReport>
    where
        P: ClipPlayer + ?Sized,
    {
        if self.mode != Mode::Clock {
            return None;
        }

        let decision = self.scheduler.decide(sample, now);
        if decision == Decision::None {
            return None;
        }

        info!("{} announcement at {}", decision, sample);
        let clips = announcement(decision, sample, self.scheduler.config());
        Some(self.play(&clips, player))
    }

    /// Spoken time on request, subject to the announcement cooldown.
    pub fn announce_now<P>(
        &mut self,
        sample: TimeSample,
        now: Instant,
        player: &mut P,
    ) -> Option<PlaybackReport>
    where
        P: ClipPlayer + ?Sized,
    {
        if !self.scheduler.request(now) {
            debug!("announcement request ignored, cooling down");
            return None;
        }
        let clips = compose_time(sample.hours, sample.minutes);
        Some(self.play(&clips, player))
    }

    fn play<P>(&mut self, clips: &ClipSequence, player: &mut P) -> PlaybackReport
    where
        P: ClipPlayer + ?Sized,
    {
        let report = play_sequence(clips, player, &mut self.fault);
        if report.skipped > 0 {
            // redraw to show the fault
            self.last_second = None;
        }
        report
    }

    pub fn on_gesture(&mut self, button: Button, gesture: Gesture, sample: TimeSample) -> Command {
        let command = match (self.mode, button, gesture) {
            (Mode::Clock, Button::Mode, Gesture::Short) => {
                self.draft = TimeSample::hm(sample.hours, sample.minutes);
                self.mode = Mode::SetHours;
                Command::None
            }
            (Mode::Clock, Button::Adjust, _) => Command::Announce,
            (Mode::Clock, Button::Mode, Gesture::Long) => Command::None,

            (Mode::SetHours, Button::Mode, Gesture::Short) => {
                self.mode = Mode::SetMinutes;
                Command::None
            }
            (Mode::SetMinutes, Button::Mode, Gesture::Short) => {
                self.mode = Mode::Clock;
                Command::SetTime(self.draft)
            }
            (Mode::SetHours | Mode::SetMinutes, Button::Mode, Gesture::Long) => {
                self.mode = Mode::Clock;
                Command::None
            }

            (Mode::SetHours, Button::Adjust, g) => {
                self.draft.hours = (self.draft.hours + step(g)) % 24;
                Command::None
            }
            (Mode::SetMinutes, Button::Adjust, g) => {
                self.draft.minutes = (self.draft.minutes + step(g)) % 60;
                Command::None
            }
        };

        if button == Button::Mode {
            info!("mode {}", self.mode);
        }
        self.last_second = None;
        command
    }

    /// True once per displayed second, and after anything that changes
    /// the screen.
    pub fn needs_redraw(&mut self, sample: TimeSample) -> bool {
        if self.last_second == Some(sample.seconds) {
            false
        } else {
            self.last_second = Some(sample.seconds);
            true
        }
    }

    pub fn render<S>(
        &mut self,
        surface: &mut S,
        sample: TimeSample,
        temperature: Option<Temperature>,
        now: Instant,
    ) where
        S: Surface + ?Sized,
    {
        if let Some(fault) = self.fault.as_mut() {
            let since = *fault.shown_since.get_or_insert(now);
            if now.since(since) < FAULT_DISPLAY_MS {
                surface.message(&fault_text(&fault.clip, fault.error));
                return;
            }
            self.fault = None;
        }

        match self.mode {
            Mode::Clock => surface.clock(sample, temperature),
            Mode::SetHours => surface.setting(Field::Hours, self.draft),
            Mode::SetMinutes => surface.setting(Field::Minutes, self.draft),
        }
    }
}

fn step(gesture: Gesture) -> u8 {
    match gesture {
        Gesture::Short => 1,
        Gesture::Long => 10,
    }
}
