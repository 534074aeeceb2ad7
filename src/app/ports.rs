//! Port traits: the hexagonal boundary between the scan loop and the rig.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ScannerService (domain)
//! ```
//!
//! Driven adapters (motor axes, rangefinder, clock, telemetry sinks,
//! storage) implement these traits.  The
//! [`ScannerService`](super::service::ScannerService) and the command
//! machine consume them via generics, so the domain core never touches
//! GPIO or I2C directly.
//!
//! ## Contract notes
//!
//! - **AxisPort** never errors: refused or failed pulses report "no motion".
//! - **RangeSensor** never errors: anything unusable is `None`.
//! - **ConfigPort::load** never fails; `save` validates before persisting.

use crate::config::ScannerConfig;

use super::events::TelemetryEvent;

// ───────────────────────────────────────────────────────────────
// Motion port (driven adapter: domain → stepper driver)
// ───────────────────────────────────────────────────────────────

/// Step direction.  `Increase` is up on Z and clockwise on X/Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
}

/// One stepper axis with its bounds and (optional) home switch.
pub trait AxisPort {
    /// Issue one pulse.  Returns `false` when the move was refused or the
    /// pulse could not be driven; position is untouched in that case.
    fn step(&mut self, direction: Direction) -> bool;

    /// Logical position in microsteps.  Always 0 on unbounded axes.
    fn position(&self) -> u32;

    /// Overwrite the logical position (clamped to `max`).
    fn set_position(&mut self, position: u32);

    fn max(&self) -> u32;

    /// Whether the home switch reports contact.
    fn limit_asserted(&mut self) -> bool;

    /// Apply new travel and timing parameters.
    fn configure(&mut self, max: u32, step_delay_us: u32, step_size: u32);

    /// Pulses issued per logical increment.
    fn step_size(&self) -> u32;

    /// Issue `step_size` pulses; returns how many actually moved.
    fn step_increment(&mut self, direction: Direction) -> u32 {
        let mut moved = 0;
        for _ in 0..self.step_size() {
            if self.step(direction) {
                moved += 1;
            }
        }
        moved
    }
}

// ───────────────────────────────────────────────────────────────
// Rangefinder port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// A distance sensor that yields one raw sample at a time.
pub trait RangeSensor {
    /// Whether bring-up succeeded.  A sensor that is not ready always
    /// samples `None`.
    fn is_ready(&self) -> bool;

    /// Block for at most one measurement cycle and return the raw distance.
    fn sample(&mut self) -> Option<u32>;
}

// ───────────────────────────────────────────────────────────────
// Rig bundle
// ───────────────────────────────────────────────────────────────

/// The two axes and the rangefinder, handed to every tick together.
pub struct ScannerRig<Z, XY, S> {
    pub z: Z,
    pub xy: XY,
    pub sensor: S,
}

impl<Z: AxisPort, XY: AxisPort, S: RangeSensor> ScannerRig<Z, XY, S> {
    pub fn new(z: Z, xy: XY, sensor: S) -> Self {
        Self { z, xy, sensor }
    }

    /// Push travel and timing parameters down to both axes.
    pub fn apply_config(&mut self, config: &ScannerConfig) {
        self.z.configure(
            u32::from(config.z_axis_max),
            u32::from(config.z_axis_delay_time),
            u32::from(config.z_axis_one_time_step),
        );
        self.xy.configure(
            u32::from(config.x_y_axis_max),
            u32::from(config.x_y_axis_step_delay_time),
            u32::from(config.x_y_axis_one_time_step),
        );
    }
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

/// Monotonic clock plus a blocking sleep for the cooperative loop.
pub trait TimePort {
    /// Milliseconds since boot.
    fn now_ms(&self) -> u64;

    fn sleep_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Telemetry sink port (driven adapter: domain → network / log)
// ───────────────────────────────────────────────────────────────

/// The machine emits structured [`TelemetryEvent`]s through this port.
/// Adapters decide where they go (serial log, websocket queue, ...).
pub trait TelemetrySink {
    fn emit(&mut self, event: &TelemetryEvent);
}

/// Fan out to two sinks.
impl<A: TelemetrySink, B: TelemetrySink> TelemetrySink for (A, B) {
    fn emit(&mut self, event: &TelemetryEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the scanner configuration.
///
/// Implementations MUST validate before persisting and reject bad values
/// with [`ConfigError::ValidationFailed`] rather than clamping them: a
/// zero-length ring or a zero Z travel would stall the scan loop.
pub trait ConfigPort {
    /// Load configuration.  Missing or unreadable entries fall back to
    /// their defaults individually; this never fails.
    fn load(&self) -> ScannerConfig;

    /// Validate and persist configuration.
    fn save(&mut self, config: &ScannerConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// Keys are namespaced; write operations MUST be atomic.  ESP-IDF NVS
/// guarantees this per commit, the in-memory simulation trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Full => Self::StorageFull,
            StorageError::NotFound | StorageError::IoError => Self::IoError,
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
