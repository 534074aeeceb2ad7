//! Scan rig firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  MotorAxis × 2     LogTelemetrySink     NvsAdapter  Esp32Time  │
//! │  AnyRangeSensor    ChannelTelemetrySink (Config)    (TimePort) │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │        ScannerService (pure logic)                     │    │
//! │  │  ScanCommandMachine · mode filter · geometry           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  COMMANDS ──▶ drain ──▶ tick ──▶ TELEMETRY                     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::peripherals::Peripherals;
use log::{info, warn};

use scanrig::adapters::channel_sink::ChannelTelemetrySink;
use scanrig::adapters::log_sink::LogTelemetrySink;
use scanrig::adapters::nvs::NvsAdapter;
use scanrig::adapters::time::Esp32TimeAdapter;
use scanrig::app::ports::{ConfigPort, TimePort};
use scanrig::app::service::ScannerService;
use scanrig::channels::{COMMANDS, TELEMETRY};
use scanrig::config::ScannerConfig;
use scanrig::drivers::hw_init::init_board;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  ScanRig v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = nvs.as_ref().map_or_else(ScannerConfig::default, |n| n.load());
    if let Some(n) = nvs.as_ref() {
        let net = n.network_settings();
        info!("network: sta '{}', ap '{}', host '{}.local'", net.sta_ssid, net.ap_ssid, net.mdns_hostname);
    }

    // ── 3. Hardware bring-up ──────────────────────────────────
    let peripherals = Peripherals::take()?;
    let mut board = init_board(peripherals.i2c0, &config)?;

    // ── 4. Domain core ────────────────────────────────────────
    let mut service = ScannerService::new(config);
    service.start();

    let mut clock = Esp32TimeAdapter::new();
    // The network task owns the producer end of COMMANDS and the consumer
    // end of TELEMETRY. Until it runs, frames beyond the queue depth are
    // dropped and counted by the channel sink.
    let mut sink = (LogTelemetrySink::new(), ChannelTelemetrySink::new(&TELEMETRY));

    // ── 5. Control loop ───────────────────────────────────────
    info!("Entering control loop");
    loop {
        service.drain_commands(&COMMANDS);
        service.tick(&mut board.rig, &mut clock, &mut sink);
        if let Some(n) = nvs.as_mut() {
            service.save_if_dirty(n);
        }
        // Let the idle task run between busy-waited step pulses.
        clock.sleep_ms(1);
    }
}
