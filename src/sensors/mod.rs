//! Rangefinder drivers and the runtime selector over them.
//!
//! Both supported parts answer at I2C address 0x29, so the board carries
//! exactly one; which one is a configuration choice
//! ([`RangeSensorKind`]) made once at bring-up.  A part that fails to
//! initialise stays in the rig as "not ready" and the scan loop falls back
//! to its default radius.

pub mod vl53l0x;
pub mod vl53l1x;

#[cfg(test)]
pub(crate) mod mock_bus;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::error;
use serde::{Deserialize, Serialize};

use crate::app::ports::RangeSensor;
use vl53l0x::Vl53l0x;
use vl53l1x::Vl53l1x;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeSensorKind {
    Vl53l1x,
    Vl53l0x,
}

/// Stand-in for a rangefinder whose bus could not be opened.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSensor;

impl RangeSensor for UnavailableSensor {
    fn is_ready(&self) -> bool {
        false
    }

    fn sample(&mut self) -> Option<u32> {
        None
    }
}

/// Whichever rangefinder the board was built with.
pub enum AnyRangeSensor<I2C, D> {
    L1x(Vl53l1x<I2C, D>),
    L0x(Vl53l0x<I2C, D>),
    Unavailable(UnavailableSensor),
}

impl<I2C: I2c, D: DelayNs> AnyRangeSensor<I2C, D> {
    /// Construct and initialise the selected part.  Failure is logged and
    /// leaves the sensor in the rig, not ready.
    pub fn bring_up(kind: RangeSensorKind, i2c: I2C, delay: D, budget_ms: u16) -> Self {
        let (sensor, result) = match kind {
            RangeSensorKind::Vl53l1x => {
                let mut s = Vl53l1x::new(i2c, delay, budget_ms);
                let r = s.init();
                (Self::L1x(s), r)
            }
            RangeSensorKind::Vl53l0x => {
                let mut s = Vl53l0x::new(i2c, delay, budget_ms);
                let r = s.init();
                (Self::L0x(s), r)
            }
        };
        if let Err(e) = result {
            error!("{:?} bring-up failed: {}", kind, e);
        }
        sensor
    }

    pub fn unavailable() -> Self {
        Self::Unavailable(UnavailableSensor)
    }
}

impl<I2C: I2c, D: DelayNs> RangeSensor for AnyRangeSensor<I2C, D> {
    fn is_ready(&self) -> bool {
        match self {
            Self::L1x(s) => s.is_ready(),
            Self::L0x(s) => s.is_ready(),
            Self::Unavailable(s) => s.is_ready(),
        }
    }

    fn sample(&mut self) -> Option<u32> {
        match self {
            Self::L1x(s) => s.sample(),
            Self::L0x(s) => s.sample(),
            Self::Unavailable(s) => s.sample(),
        }
    }
}
