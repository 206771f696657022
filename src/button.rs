//! Short/long press detection.
//!
//! The firmware debounces the pin edges and feeds `Pressed`/`Released`
//! events; it arms a [`LONG_PRESS_MS`] timer on `Pressed` and feeds
//! `Timeout` when it expires.

pub const DEBOUNCE_MS: u32 = 20;
pub const LONG_PRESS_MS: u32 = 750;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    Mode,
    Adjust,
}

impl Button {
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    Pressed,
    Released,
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gesture {
    Short,
    Long,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    ShortPressWait,
}

#[derive(Clone, Copy, Debug)]
pub struct GestureDetector {
    state: State,
}

impl GestureDetector {
    pub const fn new() -> Self {
        Self { state: State::Idle }
    }

    /// True while the long-press timer should be running.
    pub fn waiting(&self) -> bool {
        self.state == State::ShortPressWait
    }

    pub fn handle(&mut self, ev: ButtonEvent) -> Option<Gesture> {
        match (self.state, ev) {
            (State::Idle, ButtonEvent::Pressed) => {
                self.state = State::ShortPressWait;
                None
            }
            (State::Idle, _) => None,
            (State::ShortPressWait, ButtonEvent::Released) => {
                self.state = State::Idle;
                Some(Gesture::Short)
            }
            (State::ShortPressWait, ButtonEvent::Timeout) => {
                // release after this is ignored
                self.state = State::Idle;
                Some(Gesture::Long)
            }
            (State::ShortPressWait, ButtonEvent::Pressed) => {
                warn!("press while already pressed");
                None
            }
        }
    }
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new()
    }
}
