//! ST VL53L1X time-of-flight rangefinder (long distance mode).
//!
//! Register-level driver over `embedded-hal` I2C with 16-bit big-endian
//! register indices.  Bring-up follows ST's ultra-lite sequence: check the
//! boot flag and model id, upload the default configuration block, run
//! one measurement to settle the VHV calibration, then select long
//! distance mode, program the timing budget and start ranging.  Every
//! [`sample`](RangeSensor::sample) polls the data-ready line, reads the
//! crosstalk-corrected range and clears the interrupt.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use crate::app::ports::RangeSensor;
use crate::error::SensorError;

pub const DEFAULT_ADDRESS: u8 = 0x29;
pub const MODEL_ID: u16 = 0xEACC;

const VHV_CONFIG_TIMEOUT_MACROP_LOOP_BOUND: u16 = 0x0008;
const VHV_CONFIG_INIT: u16 = 0x000B;
const DEFAULT_CONFIG_START: u16 = 0x002D;
const GPIO_HV_MUX_CTRL: u16 = 0x0030;
const GPIO_TIO_HV_STATUS: u16 = 0x0031;
const PHASECAL_CONFIG_TIMEOUT_MACROP: u16 = 0x004B;
const RANGE_CONFIG_TIMEOUT_MACROP_A_HI: u16 = 0x005E;
const RANGE_CONFIG_VCSEL_PERIOD_A: u16 = 0x0060;
const RANGE_CONFIG_TIMEOUT_MACROP_B_HI: u16 = 0x0061;
const RANGE_CONFIG_VCSEL_PERIOD_B: u16 = 0x0063;
const RANGE_CONFIG_VALID_PHASE_HIGH: u16 = 0x0069;
const SYSTEM_INTERMEASUREMENT_PERIOD: u16 = 0x006C;
const SD_CONFIG_WOI_SD0: u16 = 0x0078;
const SD_CONFIG_INITIAL_PHASE_SD0: u16 = 0x007A;
const SYSTEM_INTERRUPT_CLEAR: u16 = 0x0086;
const SYSTEM_MODE_START: u16 = 0x0087;
const RESULT_RANGE_STATUS: u16 = 0x0089;
const RESULT_FINAL_CROSSTALK_CORRECTED_RANGE_MM_SD0: u16 = 0x0096;
const RESULT_OSC_CALIBRATE_VAL: u16 = 0x00DE;
const FIRMWARE_SYSTEM_STATUS: u16 = 0x00E5;
const IDENTIFICATION_MODEL_ID: u16 = 0x010F;

const MODE_START_BACK_TO_BACK: u8 = 0x40;
const MODE_STOP: u8 = 0x00;

/// ST default configuration for registers 0x2D..=0x87.  Interrupt is
/// active high on new sample; ranging is left stopped.
const DEFAULT_CONFIGURATION: [u8; 91] = [
    0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x02, 0x08, // 0x2D
    0x00, 0x08, 0x10, 0x01, 0x01, 0x00, 0x00, 0x00, // 0x35
    0x00, 0xFF, 0x00, 0x0F, 0x00, 0x00, 0x00, 0x00, // 0x3D
    0x00, 0x20, 0x0B, 0x00, 0x00, 0x02, 0x0A, 0x21, // 0x45
    0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0xC8, // 0x4D
    0x00, 0x00, 0x38, 0xFF, 0x01, 0x00, 0x08, 0x00, // 0x55
    0x00, 0x01, 0xCC, 0x0F, 0x01, 0xF1, 0x0D, 0x01, // 0x5D
    0x68, 0x00, 0x80, 0x08, 0xB8, 0x00, 0x00, 0x00, // 0x65
    0x00, 0x0F, 0x89, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x6D
    0x00, 0x00, 0x01, 0x0F, 0x0D, 0x0E, 0x0E, 0x00, // 0x75
    0x00, 0x02, 0xC7, 0xFF, 0x9B, 0x00, 0x00, 0x00, // 0x7D
    0x01, 0x01, 0x00, // 0x85
];

const BOOT_POLLS: u32 = 10;
const BOOT_POLL_MS: u32 = 10;
/// Bound on the settling measurement run during bring-up.
const SETTLE_POLLS: u32 = 10;
/// Data-ready polling backoff.
pub const POLL_INTERVAL_MS: u32 = 20;

/// Macro-period timeouts (A, B) for long distance mode, keyed by budget.
const LONG_MODE_TIMEOUTS: [(u16, u16, u16); 6] = [
    (20, 0x001E, 0x0022),
    (33, 0x0060, 0x006E),
    (50, 0x00AD, 0x00C6),
    (100, 0x01CC, 0x01EA),
    (200, 0x02D9, 0x02F8),
    (500, 0x048F, 0x04A4),
];

pub struct Vl53l1x<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    budget_ms: u16,
    ready: bool,
}

impl<I2C: I2c, D: DelayNs> Vl53l1x<I2C, D> {
    pub fn new(i2c: I2C, delay: D, budget_ms: u16) -> Self {
        Self {
            i2c,
            delay,
            address: DEFAULT_ADDRESS,
            budget_ms,
            ready: false,
        }
    }

    /// Bring the sensor up and start ranging.
    pub fn init(&mut self) -> Result<(), SensorError> {
        self.ready = false;
        self.wait_booted()?;

        let id = self.read_u16(IDENTIFICATION_MODEL_ID)?;
        if id != MODEL_ID {
            return Err(SensorError::WrongModelId(id));
        }

        self.write_bytes(DEFAULT_CONFIG_START, &DEFAULT_CONFIGURATION)?;
        self.settle_vhv()?;
        self.set_long_distance_mode()?;
        self.budget_ms = self.set_timing_budget(self.budget_ms)?;
        self.set_inter_measurement(self.budget_ms)?;

        self.write_u8(SYSTEM_INTERRUPT_CLEAR, 0x01)?;
        self.write_u8(SYSTEM_MODE_START, MODE_START_BACK_TO_BACK)?;

        self.ready = true;
        info!("VL53L1X: ranging, timing budget {} ms", self.budget_ms);
        Ok(())
    }

    /// One throw-away measurement, then seed later VHV searches from its
    /// result.
    fn settle_vhv(&mut self) -> Result<(), SensorError> {
        self.write_u8(SYSTEM_MODE_START, MODE_START_BACK_TO_BACK)?;
        if !self.wait_data_ready(SETTLE_POLLS)? {
            return Err(SensorError::Timeout);
        }
        self.write_u8(SYSTEM_INTERRUPT_CLEAR, 0x01)?;
        self.write_u8(SYSTEM_MODE_START, MODE_STOP)?;
        self.write_u8(VHV_CONFIG_TIMEOUT_MACROP_LOOP_BOUND, 0x09)?;
        self.write_u8(VHV_CONFIG_INIT, 0x00)
    }

    fn set_long_distance_mode(&mut self) -> Result<(), SensorError> {
        self.write_u8(PHASECAL_CONFIG_TIMEOUT_MACROP, 0x0A)?;
        self.write_u8(RANGE_CONFIG_VCSEL_PERIOD_A, 0x0F)?;
        self.write_u8(RANGE_CONFIG_VCSEL_PERIOD_B, 0x0D)?;
        self.write_u8(RANGE_CONFIG_VALID_PHASE_HIGH, 0xB8)?;
        self.write_u16(SD_CONFIG_WOI_SD0, 0x0F0D)?;
        self.write_u16(SD_CONFIG_INITIAL_PHASE_SD0, 0x0E0E)
    }

    /// Inter-measurement period in oscillator ticks (1.075 ticks per
    /// PLL period per ms).
    fn set_inter_measurement(&mut self, period_ms: u16) -> Result<(), SensorError> {
        let clock_pll = u32::from(self.read_u16(RESULT_OSC_CALIBRATE_VAL)? & 0x03FF);
        let ticks = clock_pll * u32::from(period_ms) * 1075 / 1000;
        self.write_bytes(SYSTEM_INTERMEASUREMENT_PERIOD, &ticks.to_be_bytes())
    }

    /// Program the long-mode macro-period timeouts.  Returns the budget
    /// actually applied (15 ms is a short-mode-only budget and maps to 20).
    pub fn set_timing_budget(&mut self, budget_ms: u16) -> Result<u16, SensorError> {
        let wanted = if budget_ms == 15 {
            warn!("VL53L1X: 15 ms budget needs short mode, using 20 ms");
            20
        } else {
            budget_ms
        };
        let &(applied, a, b) = LONG_MODE_TIMEOUTS
            .iter()
            .find(|(ms, _, _)| *ms == wanted)
            .ok_or(SensorError::InvalidTimingBudget(budget_ms))?;
        self.write_u16(RANGE_CONFIG_TIMEOUT_MACROP_A_HI, a)?;
        self.write_u16(RANGE_CONFIG_TIMEOUT_MACROP_B_HI, b)?;
        Ok(applied)
    }

    pub fn timing_budget_ms(&self) -> u16 {
        self.budget_ms
    }

    fn wait_booted(&mut self) -> Result<(), SensorError> {
        for _ in 0..BOOT_POLLS {
            if self.read_u8(FIRMWARE_SYSTEM_STATUS)? & 0x01 != 0 {
                return Ok(());
            }
            self.delay.delay_ms(BOOT_POLL_MS);
        }
        Err(SensorError::NotBooted)
    }

    fn data_ready(&mut self) -> Result<bool, SensorError> {
        let polarity = u8::from(self.read_u8(GPIO_HV_MUX_CTRL)? & 0x10 == 0);
        Ok(self.read_u8(GPIO_TIO_HV_STATUS)? & 0x01 == polarity)
    }

    fn wait_data_ready(&mut self, polls: u32) -> Result<bool, SensorError> {
        for _ in 0..polls {
            if self.data_ready()? {
                return Ok(true);
            }
            self.delay.delay_ms(POLL_INTERVAL_MS);
        }
        Ok(false)
    }

    fn read_measurement(&mut self) -> Result<u32, SensorError> {
        let polls = u32::from(self.budget_ms) / POLL_INTERVAL_MS + 2;
        if !self.wait_data_ready(polls)? {
            return Err(SensorError::Timeout);
        }

        let status = self.read_u8(RESULT_RANGE_STATUS)? & 0x1F;
        let distance = self.read_u16(RESULT_FINAL_CROSSTALK_CORRECTED_RANGE_MM_SD0)?;
        self.write_u8(SYSTEM_INTERRUPT_CLEAR, 0x01)?;
        debug!("VL53L1X: range status {} distance {}", status, distance);
        Ok(u32::from(distance))
    }

    // ── Register access ───────────────────────────────────────

    fn read_u8(&mut self, reg: u16) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &reg.to_be_bytes(), &mut buf)
            .map_err(|_| SensorError::Bus)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self, reg: u16) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &reg.to_be_bytes(), &mut buf)
            .map_err(|_| SensorError::Bus)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn write_u8(&mut self, reg: u16, value: u8) -> Result<(), SensorError> {
        self.write_bytes(reg, &[value])
    }

    fn write_u16(&mut self, reg: u16, value: u16) -> Result<(), SensorError> {
        self.write_bytes(reg, &value.to_be_bytes())
    }

    /// Auto-incrementing write starting at `reg`.
    fn write_bytes(&mut self, reg: u16, bytes: &[u8]) -> Result<(), SensorError> {
        let mut frame = [0u8; 2 + DEFAULT_CONFIGURATION.len()];
        let len = 2 + bytes.len().min(DEFAULT_CONFIGURATION.len());
        frame[..2].copy_from_slice(&reg.to_be_bytes());
        frame[2..len].copy_from_slice(&bytes[..len - 2]);
        self.i2c
            .write(self.address, &frame[..len])
            .map_err(|_| SensorError::Bus)
    }
}

impl<I2C: I2c, D: DelayNs> RangeSensor for Vl53l1x<I2C, D> {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn sample(&mut self) -> Option<u32> {
        if !self.ready {
            return None;
        }
        match self.read_measurement() {
            Ok(d) => Some(d),
            Err(e) => {
                warn!("VL53L1X: sample failed: {}", e);
                // Leave the latch clear for the next cycle.
                let _ = self.write_u8(SYSTEM_INTERRUPT_CLEAR, 0x01);
                None
            }
        }
    }
}
