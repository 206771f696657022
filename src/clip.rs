//! Clip identifiers and clip sequences.
//!
//! Clips live in the root directory of the SD card under 8.3 names:
//!
//! | clip                        | file            |
//! |-----------------------------|-----------------|
//! | numeral `n`                 | `<n>.WAV`       |
//! | feminine units digit `n`    | `<n>F.WAV`      |
//! | hour noun (1 / 2-4 / many)  | `HOUR.WAV`, `HOUR-A.WAV`, `HOURS.WAV` |
//! | minute noun                 | `MINUTE.WAV`, `MINUTE-A.WAV`, `MINUTES.WAV` |
//! | hour preamble               | `NIK_<h>.WAV`   |
//! | cuckoo call / quarter chime | `CUCKOO.WAV`, `CHIME.WAV` |

use core::fmt::{self, Write};

use heapless::{String, Vec};

use crate::speech::{AgreementClass, Unit};

/// Longest 8.3 file name.
pub const FILE_NAME_LEN: usize = 12;

/// Preamble, twelve cuckoo calls and two spoken numerals.
pub const MAX_CLIPS: usize = 1 + 12 + 2 * 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clip {
    Numeral(u8),
    FeminineUnits(u8),
    Noun(Unit, AgreementClass),
    Preamble(u8),
    Cuckoo,
    Chime,
}

impl Clip {
    pub fn file_name(&self) -> String<FILE_NAME_LEN> {
        let mut name = String::new();
        // every name fits in FILE_NAME_LEN
        write!(name, "{}", self).ok();
        name
    }
}

impl fmt::Display for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clip::Numeral(n) => write!(f, "{}.WAV", n),
            Clip::FeminineUnits(n) => write!(f, "{}F.WAV", n),
            Clip::Noun(unit, class) => {
                let stem = match unit {
                    Unit::Hour => "HOUR",
                    Unit::Minute => "MINUTE",
                };
                let suffix = match class {
                    AgreementClass::Singular => "",
                    AgreementClass::Few => "-A",
                    AgreementClass::Many => "S",
                };
                write!(f, "{}{}.WAV", stem, suffix)
            }
            Clip::Preamble(h) => write!(f, "NIK_{}.WAV", h),
            Clip::Cuckoo => f.write_str("CUCKOO.WAV"),
            Clip::Chime => f.write_str("CHIME.WAV"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Clip {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=str}", self.file_name().as_str());
    }
}

/// Ordered clips of one announcement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClipSequence {
    clips: Vec<Clip, MAX_CLIPS>,
}

impl ClipSequence {
    pub const fn new() -> Self {
        Self { clips: Vec::new() }
    }

    pub fn push(&mut self, clip: Clip) {
        if self.clips.push(clip).is_err() {
            warn!("clip sequence full, dropping {}", clip);
        }
    }

    pub fn extend_from(&mut self, other: &ClipSequence) {
        for clip in other.iter() {
            self.push(*clip);
        }
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Clip> {
        self.clips.iter()
    }

    pub fn as_slice(&self) -> &[Clip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

impl<'a> IntoIterator for &'a ClipSequence {
    type Item = &'a Clip;
    type IntoIter = core::slice::Iter<'a, Clip>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
