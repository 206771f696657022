//! DS3231 real-time clock through the `ds323x` driver, in `time` types.

use ds323x::{ic::DS3231, interface::I2cInterface, Ds323x, NaiveTime, Rtcc, Timelike};
use embedded_hal::blocking::i2c::{Write, WriteRead};
use time::Time;

use crate::sample::Temperature;

#[derive(Debug)]
pub enum Error<E> {
    Device(ds323x::Error<E, ()>),
    InvalidTime,
}

impl<E> From<ds323x::Error<E, ()>> for Error<E> {
    fn from(e: ds323x::Error<E, ()>) -> Self {
        Error::Device(e)
    }
}

pub struct Rtc<I2C> {
    dev: Ds323x<I2cInterface<I2C>, DS3231>,
}

impl<I2C, E> Rtc<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    pub fn new(i2c: I2C) -> Self {
        Self {
            dev: Ds323x::new_ds3231(i2c),
        }
    }

    pub fn release(self) -> I2C {
        self.dev.destroy_ds3231()
    }

    pub fn time(&mut self) -> Result<Time, Error<E>> {
        let t = self.dev.time()?;
        Time::from_hms(t.hour() as u8, t.minute() as u8, t.second() as u8)
            .map_err(|_| Error::InvalidTime)
    }

    /// Sets the time and clears the oscillator stop flag.
    pub fn set_time(&mut self, t: Time) -> Result<(), Error<E>> {
        let (h, m, s) = t.as_hms();
        let t = NaiveTime::from_hms_opt(h.into(), m.into(), s.into()).ok_or(Error::InvalidTime)?;
        self.dev.set_time(&t)?;
        self.dev.clear_has_been_stopped_flag()?;
        Ok(())
    }

    /// Oscillator stopped since the time was last set (battery loss).
    pub fn lost_power(&mut self) -> Result<bool, Error<E>> {
        Ok(self.dev.has_been_stopped()?)
    }

    pub fn temperature(&mut self) -> Result<Temperature, Error<E>> {
        // 0.25 degree steps, exact in f32
        let t = self.dev.temperature()?;
        Ok(Temperature::from_quarters((t * 4.0) as i16))
    }
}
