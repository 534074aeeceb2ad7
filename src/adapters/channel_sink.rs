//! Telemetry sink that queues serialised frames for the web-socket task.
//!
//! Fire-and-forget: when the queue is full the frame is dropped and
//! counted.  The scan loop never waits on the network.

use log::{debug, warn};

use crate::app::events::TelemetryEvent;
use crate::app::ports::TelemetrySink;
use crate::channels::{TelemetryChannel, TelemetryFrame};

pub struct ChannelTelemetrySink<'a> {
    channel: &'a TelemetryChannel,
    dropped: u32,
}

impl<'a> ChannelTelemetrySink<'a> {
    pub fn new(channel: &'a TelemetryChannel) -> Self {
        Self { channel, dropped: 0 }
    }

    /// Frames discarded so far (queue full, oversized or unserialisable).
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    fn drop_frame(&mut self, why: &str) {
        self.dropped = self.dropped.saturating_add(1);
        debug!("telemetry frame dropped ({}), {} total", why, self.dropped);
    }
}

impl TelemetrySink for ChannelTelemetrySink<'_> {
    fn emit(&mut self, event: &TelemetryEvent) {
        let json = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("telemetry serialisation failed: {}", e);
                self.drop_frame("serialise");
                return;
            }
        };

        let mut frame = TelemetryFrame::new();
        if frame.push_str(&json).is_err() {
            self.drop_frame("oversized");
            return;
        }

        if self.channel.try_send(frame).is_err() {
            self.drop_frame("queue full");
        }
    }
}
