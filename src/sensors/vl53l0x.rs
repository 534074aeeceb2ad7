//! ST VL53L0X time-of-flight rangefinder (back-to-back continuous mode).
//!
//! Older, shorter-range sibling of the VL53L1X with 8-bit register
//! indices.  Bring-up runs the data and static init (reference SPAD
//! selection and ST's default tuning table), applies the measurement
//! timing budget to the final-range step, performs the VHV and phase
//! reference calibrations and starts continuous ranging.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use crate::app::ports::RangeSensor;
use crate::error::SensorError;

pub const DEFAULT_ADDRESS: u8 = 0x29;
pub const MODEL_ID: u8 = 0xEE;

const SYSRANGE_START: u8 = 0x00;
const SYSTEM_SEQUENCE_CONFIG: u8 = 0x01;
const SYSTEM_INTERRUPT_CONFIG_GPIO: u8 = 0x0A;
const SYSTEM_INTERRUPT_CLEAR: u8 = 0x0B;
const RESULT_INTERRUPT_STATUS: u8 = 0x13;
const RESULT_RANGE_MM: u8 = 0x1E;
const FINAL_RANGE_CONFIG_MIN_COUNT_RATE_RTN_LIMIT: u8 = 0x44;
const MSRC_CONFIG_TIMEOUT_MACROP: u8 = 0x46;
const DYNAMIC_SPAD_NUM_REQUESTED_REF_SPAD: u8 = 0x4E;
const DYNAMIC_SPAD_REF_EN_START_OFFSET: u8 = 0x4F;
const PRE_RANGE_CONFIG_VCSEL_PERIOD: u8 = 0x50;
const PRE_RANGE_CONFIG_TIMEOUT_MACROP_HI: u8 = 0x51;
const MSRC_CONFIG_CONTROL: u8 = 0x60;
const FINAL_RANGE_CONFIG_VCSEL_PERIOD: u8 = 0x70;
const FINAL_RANGE_CONFIG_TIMEOUT_MACROP_HI: u8 = 0x71;
const GPIO_HV_MUX_ACTIVE_HIGH: u8 = 0x84;
const VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV: u8 = 0x89;
const STOP_VARIABLE: u8 = 0x91;
const SPAD_INFO: u8 = 0x92;
const GLOBAL_CONFIG_SPAD_ENABLES_REF_0: u8 = 0xB0;
const GLOBAL_CONFIG_REF_EN_START_SELECT: u8 = 0xB6;
const IDENTIFICATION_MODEL_ID: u8 = 0xC0;
const PAGE_SELECT: u8 = 0xFF;

const START_BACK_TO_BACK: u8 = 0x02;
/// Readings at or above this mean "no target in range".
const OUT_OF_RANGE_MM: u16 = 8190;
/// 0.25 MCPS in 9.7 fixed point.
const SIGNAL_RATE_LIMIT: u16 = 32;
/// MSRC and TCC off, DSS, pre-range and final-range on.
const SEQUENCE_DEFAULT: u8 = 0xE8;
/// First aperture SPAD in the reference map.
const FIRST_APERTURE_SPAD: u8 = 12;

pub const MIN_TIMING_BUDGET_MS: u16 = 20;

pub const POLL_INTERVAL_MS: u32 = 20;
/// Bound on the SPAD-info and calibration handshakes.
const HANDSHAKE_POLLS: u32 = 25;

/// Overheads in µs charged to the timing budget per enabled step.
const START_OVERHEAD_US: u32 = 1910;
const END_OVERHEAD_US: u32 = 960;
const MSRC_OVERHEAD_US: u32 = 660;
const TCC_OVERHEAD_US: u32 = 590;
const DSS_OVERHEAD_US: u32 = 690;
const PRE_RANGE_OVERHEAD_US: u32 = 660;
const FINAL_RANGE_OVERHEAD_US: u32 = 550;

/// ST default tuning settings, written in order (page switches included).
const TUNING_SETTINGS: &[(u8, u8)] = &[
    (0xFF, 0x01), (0x00, 0x00), (0xFF, 0x00), (0x09, 0x00), (0x10, 0x00),
    (0x11, 0x00), (0x24, 0x01), (0x25, 0xFF), (0x75, 0x00), (0xFF, 0x01),
    (0x4E, 0x2C), (0x48, 0x00), (0x30, 0x20), (0xFF, 0x00), (0x30, 0x09),
    (0x54, 0x00), (0x31, 0x04), (0x32, 0x03), (0x40, 0x83), (0x46, 0x25),
    (0x60, 0x00), (0x27, 0x00), (0x50, 0x06), (0x51, 0x00), (0x52, 0x96),
    (0x56, 0x08), (0x57, 0x30), (0x61, 0x00), (0x62, 0x00), (0x64, 0x00),
    (0x65, 0x00), (0x66, 0xA0), (0xFF, 0x01), (0x22, 0x32), (0x47, 0x14),
    (0x49, 0xFF), (0x4A, 0x00), (0xFF, 0x00), (0x7A, 0x0A), (0x7B, 0x00),
    (0x78, 0x21), (0xFF, 0x01), (0x23, 0x34), (0x42, 0x00), (0x44, 0xFF),
    (0x45, 0x26), (0x46, 0x05), (0x40, 0x40), (0x0E, 0x06), (0x20, 0x1A),
    (0x43, 0x40), (0xFF, 0x00), (0x34, 0x03), (0x35, 0x44), (0xFF, 0x01),
    (0x31, 0x04), (0x4B, 0x09), (0x4C, 0x05), (0x4D, 0x04), (0xFF, 0x00),
    (0x44, 0x00), (0x45, 0x20), (0x47, 0x08), (0x48, 0x28), (0x67, 0x00),
    (0x70, 0x04), (0x71, 0x01), (0x72, 0xFE), (0x76, 0x00), (0x77, 0x00),
    (0xFF, 0x01), (0x0D, 0x01), (0xFF, 0x00), (0x80, 0x01), (0x01, 0xF8),
    (0xFF, 0x01), (0x8E, 0x01), (0x00, 0x01), (0xFF, 0x00), (0x80, 0x00),
];

/// Enter and leave the private register page used for the stop variable.
const OPEN_PRIVATE_PAGE: &[(u8, u8)] = &[(0x80, 0x01), (PAGE_SELECT, 0x01), (0x00, 0x00)];
const CLOSE_PRIVATE_PAGE: &[(u8, u8)] = &[(0x00, 0x01), (PAGE_SELECT, 0x00), (0x80, 0x00)];

/// Which ranging steps the sequencer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SequenceSteps {
    tcc: bool,
    dss: bool,
    msrc: bool,
    pre_range: bool,
    final_range: bool,
}

impl From<u8> for SequenceSteps {
    fn from(reg: u8) -> Self {
        Self {
            tcc: reg & 0x10 != 0,
            dss: reg & 0x08 != 0,
            msrc: reg & 0x04 != 0,
            pre_range: reg & 0x40 != 0,
            final_range: reg & 0x80 != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StepTimeouts {
    msrc_dss_tcc_us: u32,
    pre_range_us: u32,
    pre_range_mclks: u32,
    final_range_vcsel_pclks: u32,
}

fn vcsel_period_pclks(reg: u8) -> u32 {
    (u32::from(reg) + 1) << 1
}

fn macro_period_ns(vcsel_pclks: u32) -> u32 {
    (2304 * vcsel_pclks * 1655 + 500) / 1000
}

fn mclks_to_us(mclks: u32, vcsel_pclks: u32) -> u32 {
    let ns = u64::from(macro_period_ns(vcsel_pclks));
    ((u64::from(mclks) * ns + 500) / 1000) as u32
}

fn us_to_mclks(us: u32, vcsel_pclks: u32) -> u32 {
    let ns = u64::from(macro_period_ns(vcsel_pclks)).max(1);
    ((u64::from(us) * 1000 + ns / 2) / ns) as u32
}

/// `(LSB << MSB) + 1` macro clocks.
fn decode_timeout(reg: u16) -> u32 {
    (u32::from(reg & 0x00FF) << u32::from((reg >> 8).min(31))) + 1
}

fn encode_timeout(mclks: u32) -> u16 {
    if mclks == 0 {
        return 0;
    }
    let mut lsb = mclks - 1;
    let mut msb = 0u16;
    while lsb > 0xFF {
        lsb >>= 1;
        msb += 1;
    }
    (msb << 8) | lsb as u16
}

/// Encoded final-range timeout that makes the enabled steps fill
/// `budget_us`.  `None` when the budget cannot cover them.
fn final_range_timeout(budget_us: u32, steps: SequenceSteps, t: &StepTimeouts) -> Option<u16> {
    if budget_us < u32::from(MIN_TIMING_BUDGET_MS) * 1000 || !steps.final_range {
        return None;
    }
    let mut used = START_OVERHEAD_US + END_OVERHEAD_US;
    if steps.tcc {
        used += t.msrc_dss_tcc_us + TCC_OVERHEAD_US;
    }
    if steps.dss {
        used += 2 * (t.msrc_dss_tcc_us + DSS_OVERHEAD_US);
    } else if steps.msrc {
        used += t.msrc_dss_tcc_us + MSRC_OVERHEAD_US;
    }
    if steps.pre_range {
        used += t.pre_range_us + PRE_RANGE_OVERHEAD_US;
    }
    used += FINAL_RANGE_OVERHEAD_US;
    if used > budget_us {
        return None;
    }

    let mut mclks = us_to_mclks(budget_us - used, t.final_range_vcsel_pclks);
    if steps.pre_range {
        mclks += t.pre_range_mclks;
    }
    Some(encode_timeout(mclks))
}

/// Keep exactly `count` good SPADs starting at the first one of the
/// requested type; clear every other bit.
fn select_reference_spads(map: &mut [u8; 6], count: u8, aperture: bool) {
    let first = if aperture { FIRST_APERTURE_SPAD } else { 0 };
    let mut enabled = 0u8;
    for i in 0..48u8 {
        let (byte, bit) = (usize::from(i / 8), i % 8);
        if i < first || enabled == count {
            map[byte] &= !(1 << bit);
        } else if (map[byte] >> bit) & 0x01 != 0 {
            enabled += 1;
        }
    }
}

pub struct Vl53l0x<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    budget_ms: u16,
    stop_variable: u8,
    ready: bool,
}

impl<I2C: I2c, D: DelayNs> Vl53l0x<I2C, D> {
    pub fn new(i2c: I2C, delay: D, budget_ms: u16) -> Self {
        Self {
            i2c,
            delay,
            address: DEFAULT_ADDRESS,
            budget_ms,
            stop_variable: 0,
            ready: false,
        }
    }

    pub fn init(&mut self) -> Result<(), SensorError> {
        self.ready = false;
        let id = self.read_u8(IDENTIFICATION_MODEL_ID)?;
        if id != MODEL_ID {
            return Err(SensorError::WrongModelId(u16::from(id)));
        }

        self.data_init()?;
        self.static_init()?;
        self.budget_ms = self.set_timing_budget(self.budget_ms)?;
        self.reference_calibration()?;
        self.start_continuous()?;

        self.ready = true;
        info!("VL53L0X: continuous ranging, timing budget {} ms", self.budget_ms);
        Ok(())
    }

    pub fn timing_budget_ms(&self) -> u16 {
        self.budget_ms
    }

    /// Apply `budget_ms` to the final-range step.  Returns the budget
    /// actually applied; anything under 20 ms is raised to 20.
    pub fn set_timing_budget(&mut self, budget_ms: u16) -> Result<u16, SensorError> {
        let applied = if budget_ms < MIN_TIMING_BUDGET_MS {
            warn!("VL53L0X: {} ms budget below minimum, using {} ms", budget_ms, MIN_TIMING_BUDGET_MS);
            MIN_TIMING_BUDGET_MS
        } else {
            budget_ms
        };
        let steps = SequenceSteps::from(self.read_u8(SYSTEM_SEQUENCE_CONFIG)?);
        let timeouts = self.step_timeouts()?;
        let encoded = final_range_timeout(u32::from(applied) * 1000, steps, &timeouts)
            .ok_or(SensorError::InvalidTimingBudget(budget_ms))?;
        self.write_u16(FINAL_RANGE_CONFIG_TIMEOUT_MACROP_HI, encoded)?;
        Ok(applied)
    }

    fn data_init(&mut self) -> Result<(), SensorError> {
        // 2V8 I/O levels.
        let pad = self.read_u8(VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV)?;
        self.write_u8(VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV, pad | 0x01)?;
        // I2C standard mode.
        self.write_u8(0x88, 0x00)?;

        self.write_all(OPEN_PRIVATE_PAGE)?;
        self.stop_variable = self.read_u8(STOP_VARIABLE)?;
        self.write_all(CLOSE_PRIVATE_PAGE)?;

        // Drop the MSRC and pre-range signal rate limit checks.
        let checks = self.read_u8(MSRC_CONFIG_CONTROL)?;
        self.write_u8(MSRC_CONFIG_CONTROL, checks | 0x12)?;
        self.write_u16(FINAL_RANGE_CONFIG_MIN_COUNT_RATE_RTN_LIMIT, SIGNAL_RATE_LIMIT)?;
        self.write_u8(SYSTEM_SEQUENCE_CONFIG, 0xFF)
    }

    fn static_init(&mut self) -> Result<(), SensorError> {
        let (count, aperture) = self.spad_info()?;
        let mut map = [0u8; 6];
        self.i2c
            .write_read(self.address, &[GLOBAL_CONFIG_SPAD_ENABLES_REF_0], &mut map)
            .map_err(|_| SensorError::Bus)?;

        self.write_all(&[
            (PAGE_SELECT, 0x01),
            (DYNAMIC_SPAD_REF_EN_START_OFFSET, 0x00),
            (DYNAMIC_SPAD_NUM_REQUESTED_REF_SPAD, 0x2C),
            (PAGE_SELECT, 0x00),
            (GLOBAL_CONFIG_REF_EN_START_SELECT, 0xB4),
        ])?;
        select_reference_spads(&mut map, count, aperture);
        self.write_bytes(GLOBAL_CONFIG_SPAD_ENABLES_REF_0, &map)?;
        debug!("VL53L0X: {} reference SPADs (aperture: {})", count, aperture);

        self.write_all(TUNING_SETTINGS)?;

        // Interrupt on new sample, active low.
        self.write_u8(SYSTEM_INTERRUPT_CONFIG_GPIO, 0x04)?;
        let mux = self.read_u8(GPIO_HV_MUX_ACTIVE_HIGH)?;
        self.write_u8(GPIO_HV_MUX_ACTIVE_HIGH, mux & !0x10)?;
        self.write_u8(SYSTEM_INTERRUPT_CLEAR, 0x01)?;

        self.write_u8(SYSTEM_SEQUENCE_CONFIG, SEQUENCE_DEFAULT)
    }

    /// Reference SPAD count and type from NVM.
    fn spad_info(&mut self) -> Result<(u8, bool), SensorError> {
        self.write_all(&[(0x80, 0x01), (PAGE_SELECT, 0x01), (0x00, 0x00), (PAGE_SELECT, 0x06)])?;
        let r = self.read_u8(0x83)?;
        self.write_u8(0x83, r | 0x04)?;
        self.write_all(&[(PAGE_SELECT, 0x07), (0x81, 0x01), (0x80, 0x01), (0x94, 0x6B), (0x83, 0x00)])?;

        let mut done = false;
        for _ in 0..HANDSHAKE_POLLS {
            if self.read_u8(0x83)? != 0x00 {
                done = true;
                break;
            }
            self.delay.delay_ms(1);
        }
        if !done {
            return Err(SensorError::Timeout);
        }

        self.write_u8(0x83, 0x01)?;
        let info = self.read_u8(SPAD_INFO)?;
        self.write_all(&[(0x81, 0x00), (PAGE_SELECT, 0x06)])?;
        let r = self.read_u8(0x83)?;
        self.write_u8(0x83, r & !0x04)?;
        self.write_all(&[(PAGE_SELECT, 0x01), (0x00, 0x01), (PAGE_SELECT, 0x00), (0x80, 0x00)])?;

        Ok((info & 0x7F, info & 0x80 != 0))
    }

    fn step_timeouts(&mut self) -> Result<StepTimeouts, SensorError> {
        let pre_pclks = vcsel_period_pclks(self.read_u8(PRE_RANGE_CONFIG_VCSEL_PERIOD)?);
        let msrc_mclks = u32::from(self.read_u8(MSRC_CONFIG_TIMEOUT_MACROP)?) + 1;
        let pre_range_mclks = decode_timeout(self.read_u16(PRE_RANGE_CONFIG_TIMEOUT_MACROP_HI)?);
        let final_pclks = vcsel_period_pclks(self.read_u8(FINAL_RANGE_CONFIG_VCSEL_PERIOD)?);
        Ok(StepTimeouts {
            msrc_dss_tcc_us: mclks_to_us(msrc_mclks, pre_pclks),
            pre_range_us: mclks_to_us(pre_range_mclks, pre_pclks),
            pre_range_mclks,
            final_range_vcsel_pclks: final_pclks,
        })
    }

    /// VHV then phase calibration, restoring the default sequence.
    fn reference_calibration(&mut self) -> Result<(), SensorError> {
        self.write_u8(SYSTEM_SEQUENCE_CONFIG, 0x01)?;
        self.single_ref_calibration(0x40)?;
        self.write_u8(SYSTEM_SEQUENCE_CONFIG, 0x02)?;
        self.single_ref_calibration(0x00)?;
        self.write_u8(SYSTEM_SEQUENCE_CONFIG, SEQUENCE_DEFAULT)
    }

    fn single_ref_calibration(&mut self, vhv_init: u8) -> Result<(), SensorError> {
        self.write_u8(SYSRANGE_START, 0x01 | vhv_init)?;
        if !self.wait_interrupt(HANDSHAKE_POLLS)? {
            return Err(SensorError::Timeout);
        }
        self.write_u8(SYSTEM_INTERRUPT_CLEAR, 0x01)?;
        self.write_u8(SYSRANGE_START, 0x00)
    }

    fn start_continuous(&mut self) -> Result<(), SensorError> {
        self.write_all(OPEN_PRIVATE_PAGE)?;
        self.write_u8(STOP_VARIABLE, self.stop_variable)?;
        self.write_all(CLOSE_PRIVATE_PAGE)?;
        self.write_u8(SYSRANGE_START, START_BACK_TO_BACK)
    }

    fn wait_interrupt(&mut self, polls: u32) -> Result<bool, SensorError> {
        for _ in 0..polls {
            if self.read_u8(RESULT_INTERRUPT_STATUS)? & 0x07 != 0 {
                return Ok(true);
            }
            self.delay.delay_ms(POLL_INTERVAL_MS);
        }
        Ok(false)
    }

    fn read_measurement(&mut self) -> Result<Option<u32>, SensorError> {
        let polls = u32::from(self.budget_ms) / POLL_INTERVAL_MS + 2;
        if !self.wait_interrupt(polls)? {
            return Err(SensorError::Timeout);
        }

        let mm = self.read_u16(RESULT_RANGE_MM)?;
        self.write_u8(SYSTEM_INTERRUPT_CLEAR, 0x01)?;
        Ok((mm < OUT_OF_RANGE_MM).then_some(u32::from(mm)))
    }

    // ── Register access ───────────────────────────────────────

    fn read_u8(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|_| SensorError::Bus)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self, reg: u8) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|_| SensorError::Bus)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn write_u8(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(|_| SensorError::Bus)
    }

    fn write_u16(&mut self, reg: u8, value: u16) -> Result<(), SensorError> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[reg, hi, lo])
            .map_err(|_| SensorError::Bus)
    }

    fn write_bytes(&mut self, reg: u8, bytes: &[u8; 6]) -> Result<(), SensorError> {
        let mut frame = [0u8; 7];
        frame[0] = reg;
        frame[1..].copy_from_slice(bytes);
        self.i2c
            .write(self.address, &frame)
            .map_err(|_| SensorError::Bus)
    }

    fn write_all(&mut self, pairs: &[(u8, u8)]) -> Result<(), SensorError> {
        pairs
            .iter()
            .try_for_each(|&(reg, value)| self.write_u8(reg, value))
    }
}

impl<I2C: I2c, D: DelayNs> RangeSensor for Vl53l0x<I2C, D> {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn sample(&mut self) -> Option<u32> {
        if !self.ready {
            return None;
        }
        self.read_measurement().unwrap_or_else(|e| {
            warn!("VL53L0X: sample failed: {}", e);
            let _ = self.write_u8(SYSTEM_INTERRUPT_CLEAR, 0x01);
            None
        })
    }
}
