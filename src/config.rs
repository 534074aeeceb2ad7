//! Scanner configuration parameters
//!
//! The persisted half ([`ScannerConfig`]'s u16 fields) lives in NVS, one key
//! per field, and can be rewritten at runtime from the web UI.  The
//! [`ScanTuning`] block holds compiled-in calibration and timing constants.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::control::mode_filter::MAX_CHECKS;
use crate::sensors::RangeSensorKind;

/// Timing budgets the rangefinder accepts, in milliseconds.
pub const VALID_TIMING_BUDGETS_MS: [u16; 7] = [15, 20, 33, 50, 100, 200, 500];

/// Core scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    // --- Z (vertical) axis ---
    /// Upper travel bound in microsteps
    pub z_axis_max: u16,
    /// Stored start offset (kept for the web UI; the scan always starts at the homed zero)
    pub z_axis_start_step: u16,
    /// Half-period of a Z step pulse (microseconds)
    pub z_axis_delay_time: u16,
    /// Pulses per layer advance
    pub z_axis_one_time_step: u16,

    // --- X/Y (rotary) axis ---
    /// Microsteps per full revolution
    pub x_y_axis_max: u16,
    /// Accepted samples the filter collects per point
    pub x_y_axis_check_times: u16,
    /// Half-period of a rotary step pulse (microseconds)
    pub x_y_axis_step_delay_time: u16,
    /// Pulses per angular increment
    pub x_y_axis_one_time_step: u16,

    // --- Rangefinder ---
    /// Distance from the sensor to the turntable axis (sensor units)
    pub vl53l1x_center: u16,
    /// Measurement timing budget (milliseconds)
    pub vl53l1x_timing_budget: u16,

    /// Not persisted; always the compiled-in defaults after a reload.
    #[serde(default)]
    pub tuning: ScanTuning,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            z_axis_max: 47_000,
            z_axis_start_step: 0,
            z_axis_delay_time: 100,
            z_axis_one_time_step: 400,

            x_y_axis_max: 6400, // one revolution at 1/32 microstepping
            x_y_axis_check_times: 1,
            x_y_axis_step_delay_time: 50,
            x_y_axis_one_time_step: 8,

            vl53l1x_center: 70,
            vl53l1x_timing_budget: 200,

            tuning: ScanTuning::default(),
        }
    }
}

impl ScannerConfig {
    /// Inclusive window of plausible raw distances, saturating at zero.
    pub fn valid_range(&self) -> (u16, u16) {
        let half = self.tuning.window_half_width;
        (
            self.vl53l1x_center.saturating_sub(half),
            self.vl53l1x_center.saturating_add(half),
        )
    }

    pub fn degrees_per_microstep(&self) -> f64 {
        self.tuning.motor_full_step_degrees / f64::from(self.tuning.microsteps_per_step.max(1))
    }
}

/// Range-check every persisted field.  Bad values are rejected, never clamped.
pub fn validate_config(cfg: &ScannerConfig) -> Result<(), ConfigError> {
    if cfg.z_axis_max == 0 {
        return Err(ConfigError::ValidationFailed("z_axis_max must be > 0"));
    }
    if !(1..=cfg.z_axis_max).contains(&cfg.z_axis_one_time_step) {
        return Err(ConfigError::ValidationFailed(
            "z_axis_one_time_step must be 1..=z_axis_max",
        ));
    }
    if cfg.z_axis_start_step > cfg.z_axis_max {
        return Err(ConfigError::ValidationFailed(
            "z_axis_start_step must be <= z_axis_max",
        ));
    }
    if cfg.x_y_axis_max == 0 {
        return Err(ConfigError::ValidationFailed("x_y_axis_max must be > 0"));
    }
    if !(1..=cfg.x_y_axis_max).contains(&cfg.x_y_axis_one_time_step) {
        return Err(ConfigError::ValidationFailed(
            "x_y_axis_one_time_step must be 1..=x_y_axis_max",
        ));
    }
    if !(1..=MAX_CHECKS as u16).contains(&cfg.x_y_axis_check_times) {
        return Err(ConfigError::ValidationFailed(
            "x_y_axis_check_times must be 1..=64",
        ));
    }
    if !(1..=10_000).contains(&cfg.z_axis_delay_time) {
        return Err(ConfigError::ValidationFailed(
            "z_axis_delay_time must be 1..=10000 us",
        ));
    }
    if !(1..=10_000).contains(&cfg.x_y_axis_step_delay_time) {
        return Err(ConfigError::ValidationFailed(
            "x_y_axis_step_delay_time must be 1..=10000 us",
        ));
    }
    if !VALID_TIMING_BUDGETS_MS.contains(&cfg.vl53l1x_timing_budget) {
        return Err(ConfigError::ValidationFailed(
            "vl53l1x_timing_budget must be one of 15, 20, 33, 50, 100, 200, 500",
        ));
    }
    Ok(())
}

/// Compiled-in timing and calibration constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanTuning {
    /// Minimum spacing between stop-state heartbeats
    pub send_data_time_ms: u64,
    /// Idle sleep after every stop-state tick
    pub stop_idle_ms: u32,
    /// Radius used when the rangefinder has nothing usable
    pub fallback_radius: f64,
    /// Sleep taken in place of a measurement when the sensor is down
    pub fallback_delay_ms: u32,
    /// Lead-screw travel per Z microstep (mm)
    pub z_mm_per_step: f64,
    pub motor_full_step_degrees: f64,
    pub microsteps_per_step: u16,
    /// Half-width of the accepted window around `vl53l1x_center`
    pub window_half_width: u16,
    pub sensor_kind: RangeSensorKind,
}

impl Default for ScanTuning {
    fn default() -> Self {
        Self {
            send_data_time_ms: 1000,
            stop_idle_ms: 800,
            fallback_radius: 20.0,
            fallback_delay_ms: 800,
            z_mm_per_step: 0.001_25,
            motor_full_step_degrees: 1.8,
            microsteps_per_step: 32,
            window_half_width: 70,
            sensor_kind: RangeSensorKind::Vl53l1x,
        }
    }
}

/// WiFi / mDNS / release-feed settings kept beside the scanner config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub sta_ssid: heapless::String<32>,
    pub sta_password: heapless::String<64>,
    pub ap_ssid: heapless::String<32>,
    pub ap_password: heapless::String<64>,
    pub mdns_hostname: heapless::String<32>,
    pub release_owner: heapless::String<32>,
    pub release_repo: heapless::String<32>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            sta_ssid: fixed("ssid"),
            sta_password: fixed("password"),
            ap_ssid: fixed("3D Scanner"),
            ap_password: fixed("password"),
            mdns_hostname: fixed("3d-scanner"),
            release_owner: fixed("MakerbaseMoon"),
            release_repo: fixed("3d_scanner_esp"),
        }
    }
}

/// Copy `s` into a fixed-capacity string, dropping whole chars past capacity.
pub fn fixed<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
