//! One-shot hardware bring-up.
//!
//! Claims the GPIOs listed in [`pins`](crate::pins), enables both stepper
//! drivers, opens the I2C bus and brings up the configured rangefinder.
//! Called once from `main()` before the control loop starts.

use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, Input, Output, PinDriver};
use esp_idf_hal::i2c::{I2C0, I2cConfig, I2cDriver};
use esp_idf_hal::units::Hertz;
use log::{error, info};

use crate::app::ports::ScannerRig;
use crate::config::ScannerConfig;
use crate::drivers::stepper::{ActiveLow, MotorAxis, NoLimit, Travel, enable_driver};
use crate::error::Error;
use crate::pins;
use crate::sensors::AnyRangeSensor;

pub type OutPin = PinDriver<'static, AnyOutputPin, Output>;
pub type LimitPin = PinDriver<'static, AnyInputPin, Input>;

pub type ZAxis = MotorAxis<OutPin, OutPin, ActiveLow<LimitPin>, Ets>;
pub type XyAxis = MotorAxis<OutPin, OutPin, NoLimit, Ets>;
pub type Rangefinder = AnyRangeSensor<I2cDriver<'static>, Ets>;
pub type EspRig = ScannerRig<ZAxis, XyAxis, Rangefinder>;

/// Everything the control loop drives, plus pins that must stay claimed
/// for the driver to keep its level.
pub struct Board {
    pub rig: EspRig,
    _z_enable: OutPin,
    _xy_enable: OutPin,
    _status_led: OutPin,
}

fn output(gpio: i32) -> Result<OutPin, Error> {
    // SAFETY: each GPIO number in `pins` is claimed exactly once, here.
    let pin = unsafe { AnyOutputPin::new(gpio) };
    PinDriver::output(pin).map_err(|_| Error::Init("output pin"))
}

/// Configure every peripheral and return the assembled rig.
pub fn init_board(i2c0: I2C0, config: &ScannerConfig) -> Result<Board, Error> {
    // ── Stepper drivers ───────────────────────────────────────
    let mut z_enable = output(pins::Z_EN_GPIO)?;
    let mut xy_enable = output(pins::XY_EN_GPIO)?;
    enable_driver(&mut z_enable)?;
    enable_driver(&mut xy_enable)?;

    // SAFETY: GPIO35 is input-only and not claimed elsewhere.
    // GPIO34..=39 have no internal pulls; the board carries an external
    // pull-down on the switch line.
    let limit = PinDriver::input(unsafe { AnyInputPin::new(pins::Z_LIMIT_GPIO) })
        .map_err(|_| Error::Init("Z limit pin"))?;

    let z = MotorAxis::new(
        "Z",
        output(pins::Z_STEP_GPIO)?,
        output(pins::Z_DIR_GPIO)?,
        ActiveLow(limit),
        Ets,
        Travel::Bounded,
    );

    let mut xy_dir = output(pins::XY_DIR_GPIO)?;
    xy_dir
        .set_low()
        .map_err(|_| Error::Init("X/Y direction pin"))?;
    let xy = MotorAxis::new(
        "XY",
        output(pins::XY_STEP_GPIO)?,
        xy_dir,
        NoLimit,
        Ets,
        Travel::Continuous,
    );
    info!(
        "hw_init: steppers enabled (Z step/dir/en {}/{}/{}, X/Y {}/{}/{})",
        pins::Z_STEP_GPIO,
        pins::Z_DIR_GPIO,
        pins::Z_EN_GPIO,
        pins::XY_STEP_GPIO,
        pins::XY_DIR_GPIO,
        pins::XY_EN_GPIO
    );

    let mut status_led = output(pins::STATUS_LED_GPIO)?;
    status_led
        .set_low()
        .map_err(|_| Error::Init("status LED"))?;

    // ── Rangefinder ───────────────────────────────────────────
    let kind = config.tuning.sensor_kind;
    let i2c_cfg = I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ));
    // SAFETY: SDA/SCL GPIOs are only used by this bus.
    let (sda, scl) = unsafe {
        (
            AnyIOPin::new(pins::I2C_SDA_GPIO),
            AnyIOPin::new(pins::I2C_SCL_GPIO),
        )
    };
    let sensor = match I2cDriver::new(i2c0, sda, scl, &i2c_cfg) {
        Ok(bus) => AnyRangeSensor::bring_up(kind, bus, Ets, config.vl53l1x_timing_budget),
        Err(e) => {
            error!("hw_init: I2C bus init failed ({}), rangefinder disabled", e);
            AnyRangeSensor::unavailable()
        }
    };

    let mut rig = ScannerRig::new(z, xy, sensor);
    rig.apply_config(config);
    info!("hw_init: rig ready ({:?})", kind);

    Ok(Board {
        rig,
        _z_enable: z_enable,
        _xy_enable: xy_enable,
        _status_led: status_led,
    })
}
