//! Application service: the hexagonal core.
//!
//! [`ScannerService`] owns the command state machine and the config
//! dirty flag.  It exposes a hardware-agnostic API; all I/O flows through
//! port traits injected at call sites, so the whole service runs against
//! mock adapters in tests.
//!
//! ```text
//!  CommandChannel ──▶ ┌──────────────────────────┐ ──▶ TelemetrySink
//!                     │      ScannerService       │
//!  ScannerRig    ◀──▶ │  ScanCommandMachine       │ ──▶ ConfigPort
//!                     └──────────────────────────┘
//! ```

use log::{debug, info, warn};

use crate::channels::CommandChannel;
use crate::config::{ScannerConfig, validate_config};
use crate::fsm::context::ScannerState;
use crate::fsm::{ScanCommandMachine, StateId};

use super::commands::{CommandRequest, ScanCommand};
use super::ports::{AxisPort, ConfigPort, RangeSensor, ScannerRig, TelemetrySink, TimePort};

// ───────────────────────────────────────────────────────────────
// ScannerService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct ScannerService {
    machine: ScanCommandMachine,
    config_dirty: bool,
}

impl ScannerService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the machine: call [`start`](Self::start) next.
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            machine: ScanCommandMachine::new(config),
            config_dirty: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the machine and queue the boot-time homing run.
    pub fn start(&mut self) {
        let cfg = self.machine.config();
        debug!(
            "config: z_max={} z_start={} z_delay={}us z_layer={} | xy_max={} checks={} \
             xy_delay={}us xy_step={} | center={} budget={}ms",
            cfg.z_axis_max,
            cfg.z_axis_start_step,
            cfg.z_axis_delay_time,
            cfg.z_axis_one_time_step,
            cfg.x_y_axis_max,
            cfg.x_y_axis_check_times,
            cfg.x_y_axis_step_delay_time,
            cfg.x_y_axis_one_time_step,
            cfg.vl53l1x_center,
            cfg.vl53l1x_timing_budget,
        );
        self.machine.start();
        self.machine.set_command(ScanCommand::Home, 0);
        info!("ScannerService started, homing Z");
    }

    // ── Command ingress ───────────────────────────────────────

    /// Apply one external request.
    pub fn handle_request(&mut self, request: CommandRequest) {
        match request {
            CommandRequest::SetCommand { command, steps } => {
                self.machine.set_command(command, steps);
            }
            CommandRequest::SetProjectName(name) => {
                self.machine.set_project_name(name);
            }
            CommandRequest::UpdateConfig(mut new_config) => {
                if let Err(e) = validate_config(&new_config) {
                    warn!("Rejected runtime config update: {}", e);
                    return;
                }
                // Tuning is compiled in; a remote update never overrides it.
                new_config.tuning = self.machine.config().tuning;
                self.machine.set_config(new_config);
                self.config_dirty = true;
                info!("Configuration updated at runtime");
            }
            CommandRequest::SaveConfig => {
                self.config_dirty = true;
                info!("Explicit config save requested");
            }
        }
    }

    /// Apply everything queued on `channel` without blocking.
    /// Returns how many requests were handled.
    pub fn drain_commands(&mut self, channel: &CommandChannel) -> usize {
        let mut handled = 0;
        while let Ok(request) = channel.try_receive() {
            self.handle_request(request);
            handled += 1;
        }
        handled
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle.
    pub fn tick<Z, XY, S>(
        &mut self,
        rig: &mut ScannerRig<Z, XY, S>,
        clock: &mut impl TimePort,
        sink: &mut impl TelemetrySink,
    ) where
        Z: AxisPort,
        XY: AxisPort,
        S: RangeSensor,
    {
        self.machine.tick(rig, clock, sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn current_state(&self) -> StateId {
        self.machine.current_state()
    }

    /// Z position in microsteps above home.
    pub fn z_position(&self) -> u32 {
        self.machine.z_position()
    }

    /// Read-only view of the machine's blackboard.
    pub fn state(&self) -> &ScannerState {
        self.machine.state()
    }

    /// Clone of the live configuration (for read-back to the UI).
    pub fn current_config(&self) -> ScannerConfig {
        self.machine.config().clone()
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }

    /// Persist the live config if it changed.  Returns `true` if saved.
    pub fn save_if_dirty(&mut self, storage: &mut impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        match storage.save(self.machine.config()) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config saved to NVS");
                true
            }
            Err(e) => {
                warn!("Config save failed: {}", e);
                false
            }
        }
    }
}
