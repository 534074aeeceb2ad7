//! Inter-task queues between the network side and the control loop.
//!
//! Uses `embassy-sync` bounded MPMC channels so the web-socket task can
//! hand commands to the synchronous scan loop, and take telemetry back,
//! without heap allocation or blocking either side.
//!
//! ```text
//! ┌──────────────┐  CommandRequest  ┌───────────────┐
//! │  Net task    │─────────────────▶│  Control loop │
//! │  (ws / http) │◀─────────────────│  (tick)       │
//! └──────────────┘  TelemetryFrame  └───────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::commands::CommandRequest;

/// Largest serialised telemetry frame.  A 64-byte project name of escaped
/// control characters still fits.
pub const TELEMETRY_FRAME_CAPACITY: usize = 768;

/// One serialised JSON telemetry frame.
pub type TelemetryFrame = heapless::String<TELEMETRY_FRAME_CAPACITY>;

/// Channel depth for inbound command requests.
pub const COMMAND_DEPTH: usize = 8;

/// Channel depth for outbound telemetry frames.
pub const TELEMETRY_DEPTH: usize = 16;

pub type CommandChannel = Channel<CriticalSectionRawMutex, CommandRequest, COMMAND_DEPTH>;
pub type TelemetryChannel = Channel<CriticalSectionRawMutex, TelemetryFrame, TELEMETRY_DEPTH>;

/// Inbound command channel: net task → control loop.
pub static COMMANDS: CommandChannel = Channel::new();

/// Outbound telemetry channel: control loop → net task.
pub static TELEMETRY: TelemetryChannel = Channel::new();

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::commands::ScanCommand;

    #[test]
    fn command_queue_is_bounded() {
        let ch = CommandChannel::new();
        for _ in 0..COMMAND_DEPTH {
            assert!(ch.try_send(CommandRequest::command(ScanCommand::Stop)).is_ok());
        }
        assert!(ch.try_send(CommandRequest::command(ScanCommand::Home)).is_err());
        assert_eq!(
            ch.try_receive().ok(),
            Some(CommandRequest::command(ScanCommand::Stop))
        );
    }
}
