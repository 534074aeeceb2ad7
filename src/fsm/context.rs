//! Shared mutable context threaded through every state handler.
//!
//! `ScannerState` is the single struct the handlers read from and write
//! to: the active command, the scan session, heartbeat timing and the
//! live configuration.  Think of it as the "blackboard" in a blackboard
//! architecture.  [`RigIo`] carries the driven ports for one tick.

use crate::app::commands::{Jog, ProjectName};
use crate::app::ports::{AxisPort, RangeSensor, TelemetrySink, TimePort};
use crate::config::ScannerConfig;

// ---------------------------------------------------------------------------
// Scan session (owned by the machine, cleared when Z tops out)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanSession {
    /// Empty means "no project"; scans refuse to start without one.
    pub project_name: ProjectName,
    pub point_count: u64,
    /// Stamped on the first scan tick after a Start/New.
    pub start_time_ms: Option<u64>,
    /// Rotary microsteps into the current ring.
    pub xy_progress: u32,
    /// Z microsteps above home, as of the last scan tick.
    pub z_progress: u32,
}

// ---------------------------------------------------------------------------
// Ports for one tick
// ---------------------------------------------------------------------------

/// Borrowed driven ports for a single tick.
pub struct RigIo<'a> {
    pub z: &'a mut dyn AxisPort,
    pub xy: &'a mut dyn AxisPort,
    pub sensor: &'a mut dyn RangeSensor,
    pub clock: &'a mut dyn TimePort,
    pub sink: &'a mut dyn TelemetrySink,
}

// ---------------------------------------------------------------------------
// ScannerState
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct ScannerState {
    // -- Command --
    /// Active manual move, if the command was directional.
    pub jog: Option<Jog>,
    /// Pulses left in the active manual move.
    pub move_remaining: u32,

    // -- Session --
    pub session: ScanSession,

    // -- Timing --
    /// `None` until the first heartbeat after entering Stop.
    pub last_heartbeat_ms: Option<u64>,

    // -- Rig mirror --
    /// Z position as of the end of the last tick.
    pub z_position: u32,

    // -- Configuration --
    pub config: ScannerConfig,
    /// Set when `config` changed and the axes have not been reconfigured.
    pub axes_dirty: bool,
}

impl ScannerState {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            jog: None,
            move_remaining: 0,
            session: ScanSession::default(),
            last_heartbeat_ms: None,
            z_position: 0,
            config,
            axes_dirty: true,
        }
    }

    pub fn has_project(&self) -> bool {
        !self.session.project_name.is_empty()
    }
}
