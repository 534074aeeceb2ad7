//! Unified error types for the scanner firmware.
//!
//! Only bring-up code propagates these: once the control loop is running,
//! sensor faults degrade to the fallback radius and motion faults are
//! logged no-ops.  All variants are `Copy` so they can be returned from
//! driver constructors without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible bring-up operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The rangefinder could not be brought up or read.
    Sensor(SensorError),
    /// A step/dir/enable line could not be driven.
    Motion(MotionError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Motion(e) => write!(f, "motion: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// An I2C transaction failed.
    Bus,
    /// The device has not finished its firmware boot.
    NotBooted,
    /// The model-id register did not match the expected part.
    WrongModelId(u16),
    /// No measurement completed within the timing budget.
    Timeout,
    /// The requested timing budget is not one the part supports.
    InvalidTimingBudget(u16),
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "I2C bus error"),
            Self::NotBooted => write!(f, "device not booted"),
            Self::WrongModelId(id) => write!(f, "unexpected model id 0x{id:04X}"),
            Self::Timeout => write!(f, "measurement timed out"),
            Self::InvalidTimingBudget(ms) => write!(f, "unsupported timing budget {ms} ms"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Motion errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionError {
    /// Setting a STEP, DIR or EN line failed.
    GpioWriteFailed,
    /// Reading the limit switch failed.
    GpioReadFailed,
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
        }
    }
}

impl From<MotionError> for Error {
    fn from(e: MotionError) -> Self {
        Self::Motion(e)
    }
}
