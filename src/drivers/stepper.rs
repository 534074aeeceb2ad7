//! Step/direction stepper axis (A4988 / DRV8825 / TMC2208 in legacy mode).
//!
//! One pulse is STEP high, hold, STEP low, hold.  The driver board does the
//! microstepping; this side only counts pulses.
//!
//! ## Travel
//!
//! - [`Travel::Bounded`] (Z lead screw): tracks `position` in `0..=max`,
//!   refuses to climb past `max`, refuses to descend at 0 or onto a closed
//!   home switch.
//! - [`Travel::Continuous`] (turntable): never refuses for position, does
//!   not track it.
//!
//! Refusals are silent no-ops at `debug` level.  A GPIO failure is logged
//! and reported as "no motion".
//!
//! ## Dual-target design
//!
//! Generic over `embedded-hal` 1.0 pins and delay: on ESP-IDF the bring-up
//! in [`hw_init`](super::hw_init) hands in `PinDriver`s and `Ets`; tests
//! hand in mocks.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};
use log::{debug, warn};

use crate::app::ports::{AxisPort, Direction};
use crate::error::MotionError;

// ── Home switch ───────────────────────────────────────────────

/// Anything that can tell whether the carriage sits on its home switch.
pub trait LimitSwitch {
    fn asserted(&mut self) -> bool;
}

/// Axis without a home switch.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLimit;

impl LimitSwitch for NoLimit {
    fn asserted(&mut self) -> bool {
        false
    }
}

/// Switch wired to an input that reads LOW on contact.
///
/// A read error counts as contact so a flaky line can never drive the
/// carriage into the frame.
pub struct ActiveLow<P>(pub P);

impl<P: InputPin> ActiveLow<P> {
    /// Raw contact state.
    pub fn read(&mut self) -> Result<bool, MotionError> {
        self.0.is_low().map_err(|_| MotionError::GpioReadFailed)
    }
}

impl<P: InputPin> LimitSwitch for ActiveLow<P> {
    fn asserted(&mut self) -> bool {
        self.read().unwrap_or_else(|e| {
            warn!("limit switch: {}, treating as asserted", e);
            true
        })
    }
}

/// Pull an active-LOW driver enable line low.
pub fn enable_driver<P: OutputPin>(en: &mut P) -> Result<(), MotionError> {
    en.set_low().map_err(|_| MotionError::GpioWriteFailed)
}

// ── Axis ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Travel {
    Bounded,
    Continuous,
}

pub struct MotorAxis<STEP, DIR, LIM, D> {
    name: &'static str,
    step_pin: STEP,
    dir_pin: DIR,
    limit: LIM,
    delay: D,
    travel: Travel,
    position: u32,
    max: u32,
    step_delay_us: u32,
    step_size: u32,
}

impl<STEP, DIR, LIM, D> MotorAxis<STEP, DIR, LIM, D>
where
    STEP: OutputPin,
    DIR: OutputPin,
    LIM: LimitSwitch,
    D: DelayNs,
{
    pub fn new(
        name: &'static str,
        step_pin: STEP,
        dir_pin: DIR,
        limit: LIM,
        delay: D,
        travel: Travel,
    ) -> Self {
        Self {
            name,
            step_pin,
            dir_pin,
            limit,
            delay,
            travel,
            position: 0,
            max: 0,
            step_delay_us: 0,
            step_size: 1,
        }
    }

    fn refusal(&mut self, direction: Direction) -> Option<&'static str> {
        match (self.travel, direction) {
            (_, Direction::Decrease) if self.limit.asserted() => Some("home switch closed"),
            (Travel::Continuous, _) => None,
            (Travel::Bounded, Direction::Increase) if self.position >= self.max => Some("at max"),
            (Travel::Bounded, Direction::Decrease) if self.position == 0 => Some("at zero"),
            _ => None,
        }
    }

    fn pulse(&mut self, direction: Direction) -> Result<(), MotionError> {
        fn gpio<E>(_: E) -> MotionError {
            MotionError::GpioWriteFailed
        }
        self.dir_pin
            .set_state(PinState::from(direction == Direction::Increase))
            .map_err(gpio)?;
        self.step_pin.set_high().map_err(gpio)?;
        self.delay.delay_us(self.step_delay_us);
        self.step_pin.set_low().map_err(gpio)?;
        self.delay.delay_us(self.step_delay_us);
        Ok(())
    }
}

impl<STEP, DIR, LIM, D> AxisPort for MotorAxis<STEP, DIR, LIM, D>
where
    STEP: OutputPin,
    DIR: OutputPin,
    LIM: LimitSwitch,
    D: DelayNs,
{
    fn step(&mut self, direction: Direction) -> bool {
        if let Some(why) = self.refusal(direction) {
            debug!(
                "{}: {:?} refused ({}), position={}",
                self.name, direction, why, self.position
            );
            return false;
        }
        if let Err(e) = self.pulse(direction) {
            warn!("{}: pulse failed: {}", self.name, e);
            return false;
        }
        if self.travel == Travel::Bounded {
            match direction {
                Direction::Increase => self.position += 1,
                Direction::Decrease => self.position -= 1,
            }
        }
        true
    }

    fn position(&self) -> u32 {
        self.position
    }

    fn set_position(&mut self, position: u32) {
        if self.travel == Travel::Bounded {
            self.position = position.min(self.max);
        }
    }

    fn max(&self) -> u32 {
        self.max
    }

    fn limit_asserted(&mut self) -> bool {
        self.limit.asserted()
    }

    fn configure(&mut self, max: u32, step_delay_us: u32, step_size: u32) {
        self.max = max;
        self.step_delay_us = step_delay_us;
        self.step_size = step_size;
        if self.travel == Travel::Bounded && self.position > max {
            self.position = max;
        }
    }

    fn step_size(&self) -> u32 {
        self.step_size
    }
}
