//! Clip sequencing.

use core::fmt;

use crate::clip::{Clip, ClipSequence};

/// Why a WAV clip could not be played.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    NotRiff,
    NotWave,
    MissingFormat,
    MissingData,
    UnsupportedFormat,
    Truncated,
    ReadFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClipError {
    NotFound,
    Decode(DecodeError),
}

impl From<DecodeError> for ClipError {
    fn from(e: DecodeError) -> Self {
        ClipError::Decode(e)
    }
}

impl fmt::Display for ClipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipError::NotFound => f.write_str("not found"),
            ClipError::Decode(DecodeError::UnsupportedFormat) => f.write_str("bad format"),
            ClipError::Decode(DecodeError::ReadFailed) => f.write_str("read error"),
            ClipError::Decode(_) => f.write_str("bad file"),
        }
    }
}

/// Plays one clip to completion before returning.
pub trait ClipPlayer {
    fn play(&mut self, clip: &Clip) -> Result<(), ClipError>;
}

/// Told about every clip that had to be skipped.
pub trait PlaybackObserver {
    fn skipped(&mut self, clip: &Clip, error: ClipError);
}

impl PlaybackObserver for () {
    fn skipped(&mut self, _clip: &Clip, _error: ClipError) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlaybackReport {
    pub played: u8,
    pub skipped: u8,
}

/// Plays `sequence` in order. A failing clip is skipped, never the rest of
/// the announcement.
pub fn play_sequence<P, O>(
    sequence: &ClipSequence,
    player: &mut P,
    observer: &mut O,
) -> PlaybackReport
where
    P: ClipPlayer + ?Sized,
    O: PlaybackObserver + ?Sized,
{
    let mut report = PlaybackReport::default();
    for clip in sequence {
        trace!("playing {}", clip);
        match player.play(clip) {
            Ok(()) => report.played += 1,
            Err(e) => {
                warn!("skipping {}: {}", clip, e);
                observer.skipped(clip, e);
                report.skipped += 1;
            }
        }
    }
    report
}
