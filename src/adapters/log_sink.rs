//! Log-based telemetry sink adapter.
//!
//! Implements [`TelemetrySink`] by writing scanner telemetry to the
//! ESP-IDF logger (UART / USB-CDC in production).  The channel sink
//! carries the same events to the web UI.

use log::info;

use crate::app::events::TelemetryEvent;
use crate::app::ports::TelemetrySink;

/// Adapter that logs every [`TelemetryEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogTelemetrySink;

impl LogTelemetrySink {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for LogTelemetrySink {
    fn emit(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::Heartbeat(h) => {
                info!(
                    "STOP  | z={} | range={} | project='{}'",
                    h.z_steps,
                    h.distance.unwrap_or(0),
                    h.name
                );
            }
            TelemetryEvent::ScanProgress(p) => {
                let (x, y, z) = event.point().map_or((0.0, 0.0, 0.0), |pt| (pt.x, pt.y, pt.z));
                info!(
                    "SCAN  | #{} t={:.1}s | z={} r={:.1} | ({:.2}, {:.2}, {:.3})",
                    p.points_count, p.time, p.z_steps, p.r, x, y, z
                );
            }
        }
    }
}
