//! Spoken time composition.
//!
//! A two-digit numeral is read either as a single word (zero, and the
//! compound numerals ten to nineteen) or as a tens word followed by a
//! units word. The noun after it agrees with the numeral: one takes the
//! singular, two to four take the paucal form, everything else (including
//! all of eleven to nineteen) takes the plural. Minutes are feminine, so
//! "one" and "two" have their own recordings when counting minutes.

use crate::clip::{Clip, ClipSequence};

/// Noun counted by a numeral.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Unit {
    Hour,
    Minute,
}

/// How a numeral is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NumeralForm {
    Zero,
    /// 10 to 19, one irregular word.
    TenCompound,
    /// Tens word and/or units word.
    Standard,
}

/// Noun form required after a numeral.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AgreementClass {
    Singular,
    Few,
    Many,
}

pub const fn numeral_form(n: u8) -> NumeralForm {
    match n {
        0 => NumeralForm::Zero,
        10..=19 => NumeralForm::TenCompound,
        _ => NumeralForm::Standard,
    }
}

pub const fn agreement(n: u8) -> AgreementClass {
    if n / 10 % 10 == 1 {
        return AgreementClass::Many;
    }
    match n % 10 {
        1 => AgreementClass::Singular,
        2..=4 => AgreementClass::Few,
        _ => AgreementClass::Many,
    }
}

/// Numeral clips followed by the agreeing noun, e.g. 22 minutes ->
/// `20.WAV 2F.WAV MINUTE-A.WAV`.
pub fn compose_numeral(n: u8, unit: Unit) -> ClipSequence {
    debug_assert!(n < 60);
    let mut seq = ClipSequence::new();

    match numeral_form(n) {
        NumeralForm::Zero => seq.push(Clip::Numeral(0)),
        NumeralForm::TenCompound => seq.push(Clip::Numeral(n)),
        NumeralForm::Standard => {
            let (tens, units) = (n / 10, n % 10);
            if tens > 0 {
                seq.push(Clip::Numeral(tens * 10));
            }
            match (unit, units) {
                (_, 0) => {}
                (Unit::Minute, 1 | 2) => seq.push(Clip::FeminineUnits(units)),
                _ => seq.push(Clip::Numeral(units)),
            }
        }
    }

    seq.push(Clip::Noun(unit, agreement(n)));
    seq
}

pub fn compose_hour(hours: u8) -> ClipSequence {
    compose_numeral(hours, Unit::Hour)
}

pub fn compose_minute(minutes: u8) -> ClipSequence {
    compose_numeral(minutes, Unit::Minute)
}

/// Full spoken time: hours then minutes.
pub fn compose_time(hours: u8, minutes: u8) -> ClipSequence {
    let mut seq = compose_hour(hours);
    seq.extend_from(&compose_minute(minutes));
    seq
}
