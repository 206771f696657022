//! Talking cuckoo clock.
//!
//! Board-agnostic logic of the clock: the announcement scheduler, the
//! spoken-time composer, clip sequencing and WAV playback, button gestures
//! and the control-loop context. The STM32F103 firmware in
//! `src/bin/cuckoo_clock.rs` wires it to the DS3231, the OLED, the SD card
//! and the PWM audio output.
#![cfg_attr(not(test), no_std)]

// must stay first so the macros are visible to the other modules
mod fmt;

pub mod button;
pub mod clip;
pub mod clock;
pub mod config;
pub mod display;
pub mod playback;
pub mod rtc;
pub mod sample;
pub mod scheduler;
pub mod speech;
pub mod wav;

#[cfg(feature = "firmware")]
mod runtime;

pub use clip::{Clip, ClipSequence};
pub use clock::{ClockContext, Command, Mode};
pub use config::ClockConfig;
pub use playback::{ClipError, ClipPlayer};
pub use sample::{Instant, Temperature, TimeSample};
pub use scheduler::{Decision, Scheduler};
