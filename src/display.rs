//! Display surface and the texts shown on it.

use core::fmt::Write;

use heapless::String;

use crate::clip::Clip;
use crate::playback::ClipError;
use crate::sample::{Temperature, TimeSample};

/// Time field being edited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Hours,
    Minutes,
}

/// Rendering collaborator, implemented by the firmware on its display.
pub trait Surface {
    /// Big `HH:MM` digits, seconds and temperature.
    fn clock(&mut self, time: TimeSample, temperature: Option<Temperature>);

    /// Draft time with `field` highlighted.
    fn setting(&mut self, field: Field, draft: TimeSample);

    /// Short status line replacing the clock.
    fn message(&mut self, text: &str);
}

pub fn clock_text(t: TimeSample) -> String<5> {
    let mut s = String::new();
    write!(s, "{:02}:{:02}", t.hours, t.minutes).ok();
    s
}

pub fn seconds_text(t: TimeSample) -> String<2> {
    let mut s = String::new();
    write!(s, "{:02}", t.seconds).ok();
    s
}

pub fn temperature_text(t: Temperature) -> String<8> {
    let mut s = String::new();
    write!(s, "{}", t).ok();
    s
}

pub fn setting_text(field: Field) -> &'static str {
    match field {
        Field::Hours => "SET HOURS",
        Field::Minutes => "SET MINUTES",
    }
}

pub fn fault_text(clip: &Clip, error: ClipError) -> String<24> {
    let mut s = String::new();
    write!(s, "{} {}", clip, error).ok();
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::DecodeError;

    #[test]
    fn texts() {
        let t = TimeSample::new(7, 5, 9);
        assert_eq!(clock_text(t), "07:05");
        assert_eq!(seconds_text(t), "09");
        assert_eq!(temperature_text(Temperature(235)), "+23.5C");
        assert_eq!(temperature_text(Temperature(-42)), "-4.2C");
        assert_eq!(temperature_text(Temperature(-1234)), "-123.4C");
        assert_eq!(setting_text(Field::Minutes), "SET MINUTES");
    }

    #[test]
    fn fault_texts_fit() {
        assert_eq!(
            fault_text(&Clip::Cuckoo, ClipError::NotFound),
            "CUCKOO.WAV not found"
        );
        assert_eq!(
            fault_text(&Clip::Numeral(40), DecodeError::Truncated.into()),
            "40.WAV bad file"
        );
    }
}
