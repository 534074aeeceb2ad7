//! Mock hardware for integration tests.
//!
//! Real [`MotorAxis`] drivers run over counting GPIO mocks, so tests can
//! assert on exact pulse counts without touching real registers.

use core::cell::Cell;
use core::convert::Infallible;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use scanrig::app::events::TelemetryEvent;
use scanrig::app::ports::{
    ConfigError, ConfigPort, RangeSensor, ScannerRig, TelemetrySink, TimePort,
};
use scanrig::config::ScannerConfig;
use scanrig::drivers::stepper::{ActiveLow, MotorAxis, NoLimit, Travel};

// ── GPIO ──────────────────────────────────────────────────────

/// STEP output that counts rising edges.
pub struct StepPin {
    high: bool,
    pub pulses: Rc<Cell<u32>>,
}

impl ErrorType for StepPin {
    type Error = Infallible;
}

impl OutputPin for StepPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.high {
            self.pulses.set(self.pulses.get() + 1);
        }
        self.high = true;
        Ok(())
    }
}

/// DIR output that only remembers its level.
#[derive(Default)]
pub struct DirPin {
    pub high: Rc<Cell<bool>>,
}

impl ErrorType for DirPin {
    type Error = Infallible;
}

impl OutputPin for DirPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high.set(true);
        Ok(())
    }
}

/// Home switch input: reads LOW once `pulses` reaches `close_after`.
pub struct SwitchPin {
    pulses: Rc<Cell<u32>>,
    close_after: Option<u32>,
}

impl ErrorType for SwitchPin {
    type Error = Infallible;
}

impl InputPin for SwitchPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.is_low()?)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.close_after.is_some_and(|n| self.pulses.get() >= n))
    }
}

#[derive(Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

// ── Rangefinder ───────────────────────────────────────────────

/// Plays back scripted samples, then repeats `fallback`.
pub struct ScriptedSensor {
    pub ready: bool,
    pub script: VecDeque<Option<u32>>,
    pub fallback: Option<u32>,
    pub calls: Rc<Cell<u32>>,
}

#[allow(dead_code)]
impl ScriptedSensor {
    pub fn offline() -> Self {
        Self {
            ready: false,
            script: VecDeque::new(),
            fallback: None,
            calls: Rc::default(),
        }
    }

    pub fn steady(distance: u32) -> Self {
        Self {
            ready: true,
            script: VecDeque::new(),
            fallback: Some(distance),
            calls: Rc::default(),
        }
    }

    pub fn scripted(samples: &[Option<u32>]) -> Self {
        Self {
            ready: true,
            script: samples.iter().copied().collect(),
            fallback: None,
            calls: Rc::default(),
        }
    }
}

impl RangeSensor for ScriptedSensor {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn sample(&mut self) -> Option<u32> {
        self.calls.set(self.calls.get() + 1);
        if !self.ready {
            return None;
        }
        self.script.pop_front().unwrap_or(self.fallback)
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub type ZAxis = MotorAxis<StepPin, DirPin, ActiveLow<SwitchPin>, NoDelay>;
pub type XyAxis = MotorAxis<StepPin, DirPin, NoLimit, NoDelay>;
pub type MockRig = ScannerRig<ZAxis, XyAxis, ScriptedSensor>;

/// Pulse counters and DIR levels observed by the mocks.
#[derive(Clone, Default)]
pub struct Counters {
    pub z_pulses: Rc<Cell<u32>>,
    pub xy_pulses: Rc<Cell<u32>>,
    pub z_dir_up: Rc<Cell<bool>>,
    pub sensor_calls: Rc<Cell<u32>>,
}

/// Build a rig whose Z home switch closes after `close_after` Z pulses
/// (`None`: never closes).
pub fn rig_with_switch(sensor: ScriptedSensor, close_after: Option<u32>) -> (MockRig, Counters) {
    let counters = Counters {
        sensor_calls: sensor.calls.clone(),
        ..Counters::default()
    };
    let z = MotorAxis::new(
        "Z",
        StepPin {
            high: false,
            pulses: counters.z_pulses.clone(),
        },
        DirPin {
            high: counters.z_dir_up.clone(),
        },
        ActiveLow(SwitchPin {
            pulses: counters.z_pulses.clone(),
            close_after,
        }),
        NoDelay,
        Travel::Bounded,
    );
    let xy = MotorAxis::new(
        "XY",
        StepPin {
            high: false,
            pulses: counters.xy_pulses.clone(),
        },
        DirPin::default(),
        NoLimit,
        NoDelay,
        Travel::Continuous,
    );
    (ScannerRig::new(z, xy, sensor), counters)
}

pub fn rig(sensor: ScriptedSensor) -> (MockRig, Counters) {
    rig_with_switch(sensor, None)
}

// ── Clock ─────────────────────────────────────────────────────

/// Virtual clock: sleeping advances time, nothing else does.
#[derive(Default)]
pub struct FakeClock {
    pub now_ms: u64,
    pub slept_ms: u64,
}

impl TimePort for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.now_ms += u64::from(ms);
        self.slept_ms += u64::from(ms);
    }
}

// ── Telemetry ─────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<TelemetryEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn heartbeats(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TelemetryEvent::Heartbeat(_)))
            .count()
    }

    pub fn scan_points(&self) -> usize {
        self.events.iter().filter(|e| e.point().is_some()).count()
    }
}

impl TelemetrySink for RecordingSink {
    fn emit(&mut self, event: &TelemetryEvent) {
        self.events.push(event.clone());
    }
}

// ── Config store ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    pub saved: Option<ScannerConfig>,
    pub saves: u32,
}

impl ConfigPort for MockNvs {
    fn load(&self) -> ScannerConfig {
        self.saved.clone().unwrap_or_default()
    }

    fn save(&mut self, config: &ScannerConfig) -> Result<(), ConfigError> {
        scanrig::config::validate_config(config)?;
        self.saved = Some(config.clone());
        self.saves += 1;
        Ok(())
    }
}

/// Small travel so scans finish in a handful of ticks.
pub fn small_config() -> ScannerConfig {
    ScannerConfig {
        z_axis_max: 40,
        z_axis_one_time_step: 20,
        x_y_axis_max: 32,
        x_y_axis_one_time_step: 8,
        ..ScannerConfig::default()
    }
}
