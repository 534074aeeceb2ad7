//! GPIO / peripheral pin assignments for the scanner main board.
//!
//! Single source of truth for the driver bring-up in
//! [`drivers::hw_init`](crate::drivers::hw_init).

// ---------------------------------------------------------------------------
// Z (vertical) axis stepper driver
// ---------------------------------------------------------------------------

pub const Z_STEP_GPIO: i32 = 25;
/// HIGH = up (towards `z_axis_max`).
pub const Z_DIR_GPIO: i32 = 26;
/// Active LOW driver enable.
pub const Z_EN_GPIO: i32 = 32;

// ---------------------------------------------------------------------------
// X/Y (turntable) stepper driver
// ---------------------------------------------------------------------------

pub const XY_STEP_GPIO: i32 = 27;
/// HIGH = clockwise ("right").
pub const XY_DIR_GPIO: i32 = 13;
/// Active LOW driver enable.
pub const XY_EN_GPIO: i32 = 33;

// ---------------------------------------------------------------------------
// Z home switch
// ---------------------------------------------------------------------------

/// Input-only pad without internal pulls: the board fits an external
/// pull-down.  Reads LOW once the carriage touches the switch.
pub const Z_LIMIT_GPIO: i32 = 35;

/// ESP32 pads that can only be inputs and have no pull resistors.
pub const INPUT_ONLY_GPIOS: core::ops::RangeInclusive<i32> = 34..=39;

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

/// On-board status LED.
pub const STATUS_LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// I²C bus (rangefinder)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
pub const I2C_FREQ_HZ: u32 = 400_000;
