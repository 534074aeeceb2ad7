//! Function-pointer command state machine.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                       │
//! │  ┌──────────┬───────────┬──────────┬───────────────────────────┐  │
//! │  │ StateId  │ on_enter  │ on_exit  │ on_update                 │  │
//! │  ├──────────┼───────────┼──────────┼───────────────────────────┤  │
//! │  │ Stop     │ fn(st)    │          │ fn(st, io) -> Option<Id>  │  │
//! │  │ Home     │ fn(st)    │          │ fn(st, io) -> Option<Id>  │  │
//! │  │ Scanning │ fn(st)    │ fn(st)   │ fn(st, io) -> Option<Id>  │  │
//! │  │ Moving   │ fn(st)    │ fn(st)   │ fn(st, io) -> Option<Id>  │  │
//! │  └──────────┴───────────┴──────────┴───────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state with
//! the [`ScannerState`] blackboard and the tick's driven ports.  If it
//! returns `Some(next)`, the engine runs `on_exit` for the current state,
//! then `on_enter` for the next.  External commands arrive through
//! [`ScanCommandMachine::set_command`], which re-enters the target state
//! even when it is already current.

pub mod context;
pub mod states;

use context::{RigIo, ScannerState};
use log::info;

use crate::app::commands::{ProjectName, ScanCommand};
use crate::app::ports::{AxisPort, RangeSensor, ScannerRig, TelemetrySink, TimePort};
use crate::config::ScannerConfig;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all machine states.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Stop = 0,
    Home = 1,
    Scanning = 2,
    Moving = 3,
}

impl StateId {
    /// Total number of states: used to size the table array.
    pub const COUNT: usize = 4;

    /// The state a command drives the machine into.
    pub fn for_command(cmd: ScanCommand) -> Self {
        match cmd {
            ScanCommand::Stop => Self::Stop,
            ScanCommand::Home => Self::Home,
            ScanCommand::NewProject | ScanCommand::Start => Self::Scanning,
            ScanCommand::StepUp
            | ScanCommand::StepDown
            | ScanCommand::StepRight
            | ScanCommand::StepLeft => Self::Moving,
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut ScannerState);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut ScannerState, &mut RigIo<'_>) -> Option<StateId>;

/// Static descriptor for a single state.
pub struct StateDescriptor {
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// The scanner's command state machine.
///
/// Owns the state table and the [`ScannerState`] blackboard.  It is the
/// only writer of command and session state.
pub struct ScanCommandMachine {
    table: [StateDescriptor; StateId::COUNT],
    current: StateId,
    st: ScannerState,
}

impl ScanCommandMachine {
    /// Construct the machine in `Stop`.  Call [`start`](Self::start) next.
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            table: states::build_state_table(),
            current: StateId::Stop,
            st: ScannerState::new(config),
        }
    }

    /// Run the initial `on_enter`.
    pub fn start(&mut self) {
        info!("FSM starting in state: {}", self.descriptor().name);
        let enter = self.descriptor().on_enter;
        if let Some(enter) = enter {
            enter(&mut self.st);
        }
    }

    // ── Command ingress ───────────────────────────────────────

    /// Switch the active command.  Returns `false` when the command was
    /// ignored (a scan without a project name).
    pub fn set_command(&mut self, command: ScanCommand, steps: u32) -> bool {
        if command.is_scan() && !self.st.has_project() {
            info!("'{}' ignored: no project name set", command);
            return false;
        }

        self.st.session.xy_progress = 0;
        if command.is_scan() {
            self.st.session.point_count = 0;
            self.st.session.start_time_ms = None;
        }

        let next = StateId::for_command(command);
        // Leave first so a previous move's exit hook can't clobber the new one.
        self.exit_current();
        if let Some(jog) = command.jog() {
            self.st.jog = Some(jog);
            self.st.move_remaining = steps.max(1);
        }
        self.enter(next);
        true
    }

    /// Name the scan session.  Resets the point counter.
    pub fn set_project_name(&mut self, name: ProjectName) {
        info!("project name set to '{}'", name);
        self.st.session.project_name = name;
        self.st.session.point_count = 0;
    }

    /// Replace the live configuration; axes pick it up on the next tick.
    pub fn set_config(&mut self, config: ScannerConfig) {
        self.st.config = config;
        self.st.axes_dirty = true;
    }

    // ── Per-tick ──────────────────────────────────────────────

    /// Advance by one tick.
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
        if self.st.axes_dirty {
            rig.apply_config(&self.st.config);
            self.st.axes_dirty = false;
        }

        let next = {
            let mut io = RigIo {
                z: &mut rig.z,
                xy: &mut rig.xy,
                sensor: &mut rig.sensor,
                clock,
                sink,
            };
            let update = self.descriptor().on_update;
            update(&mut self.st, &mut io)
        };

        self.st.z_position = rig.z.position();

        if let Some(next_id) = next {
            self.transition(next_id);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn current_state(&self) -> StateId {
        self.current
    }

    /// Z position as of the end of the last tick.
    pub fn z_position(&self) -> u32 {
        self.st.z_position
    }

    pub fn state(&self) -> &ScannerState {
        &self.st
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.st.config
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn descriptor(&self) -> &StateDescriptor {
        &self.table[self.current as usize]
    }

    fn transition(&mut self, next: StateId) {
        info!(
            "FSM transition: {} -> {}",
            self.descriptor().name,
            self.table[next as usize].name
        );
        self.exit_current();
        self.enter(next);
    }

    fn exit_current(&mut self) {
        let exit = self.descriptor().on_exit;
        if let Some(exit) = exit {
            exit(&mut self.st);
        }
    }

    fn enter(&mut self, next: StateId) {
        self.current = next;
        let enter = self.descriptor().on_enter;
        if let Some(enter) = enter {
            enter(&mut self.st);
        }
    }
}
