//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers over the
//! [`ScannerState`] blackboard and the tick's [`RigIo`].  No closures, no
//! heap.
//!
//! ```text
//!           set_command(Home)             home switch / floor
//!   boot ──────────────────▶ HOME ────────────────────────────┐
//!                                                             ▼
//!   SCANNING ◀──[Start|New, name set]──────────────────── STOP ◀──┐
//!      │                                                    ▲     │
//!      └──[Z at max / name cleared]─────────────────────────┘     │
//!                                                                 │
//!   MOVING(n) ──[n reaches 0]─────────────────────────────────────┘
//!
//!   Any state ──[set_command]──▶ the command's state
//! ```

use log::{info, warn};

use super::context::{RigIo, ScannerState};
use super::{StateDescriptor, StateId};
use crate::app::commands::Axis;
use crate::app::events::{ScanPoint, ScanProgress, ScanStatus, TelemetryEvent};
use crate::app::ports::Direction;
use crate::control::geometry::{angle_for, project, radius_for};
use crate::control::mode_filter::collect_mode;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at construction.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Stop
        StateDescriptor {
            name: "Stop",
            on_enter: Some(stop_enter),
            on_exit: None,
            on_update: stop_update,
        },
        // Index 1: Home
        StateDescriptor {
            name: "Home",
            on_enter: Some(home_enter),
            on_exit: None,
            on_update: home_update,
        },
        // Index 2: Scanning
        StateDescriptor {
            name: "Scanning",
            on_enter: Some(scanning_enter),
            on_exit: Some(scanning_exit),
            on_update: scanning_update,
        },
        // Index 3: Moving
        StateDescriptor {
            name: "Moving",
            on_enter: Some(moving_enter),
            on_exit: Some(moving_exit),
            on_update: moving_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  STOP: idle, heartbeat for the UI
// ═══════════════════════════════════════════════════════════════════════════

fn stop_enter(st: &mut ScannerState) {
    // First tick in Stop reports straight away.
    st.last_heartbeat_ms = None;
}

fn stop_update(st: &mut ScannerState, io: &mut RigIo<'_>) -> Option<StateId> {
    let now = io.clock.now_ms();
    let due = st
        .last_heartbeat_ms
        .is_none_or(|last| now.saturating_sub(last) >= st.config.tuning.send_data_time_ms);

    if due {
        let distance = io.sensor.sample();
        let event = TelemetryEvent::heartbeat(io.z.position(), distance, &st.session.project_name);
        io.sink.emit(&event);
        st.last_heartbeat_ms = Some(now);
    }

    io.clock.sleep_ms(st.config.tuning.stop_idle_ms);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  HOME: drive Z down onto its switch, then call that zero
// ═══════════════════════════════════════════════════════════════════════════

fn home_enter(_st: &mut ScannerState) {
    info!("HOME: seeking Z home switch");
}

fn home_update(st: &mut ScannerState, io: &mut RigIo<'_>) -> Option<StateId> {
    // Assume the worst case so the axis allows a full-travel descent.
    let max = io.z.max();
    io.z.set_position(max);

    let mut pulses: u32 = 0;
    loop {
        if io.z.limit_asserted() {
            info!("HOME: switch reached after {} pulses", pulses);
            break;
        }
        if !io.z.step(Direction::Decrease) {
            warn!(
                "HOME: Z stopped after {} pulses without reaching the switch",
                pulses
            );
            break;
        }
        pulses += 1;
    }

    io.z.set_position(0);
    st.session.z_progress = 0;
    Some(StateId::Stop)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SCANNING: one point per tick, ring by ring up the Z axis
// ═══════════════════════════════════════════════════════════════════════════

fn scanning_enter(st: &mut ScannerState) {
    info!(
        "SCANNING: project '{}' ({} checks per point)",
        st.session.project_name, st.config.x_y_axis_check_times
    );
}

fn scanning_exit(st: &mut ScannerState) {
    info!("SCANNING: ended after {} points", st.session.point_count);
}

fn scanning_update(st: &mut ScannerState, io: &mut RigIo<'_>) -> Option<StateId> {
    if !st.has_project() {
        info!("SCANNING: project name cleared, stopping");
        return Some(StateId::Stop);
    }

    let cfg = &st.config;
    let tuning = cfg.tuning;
    let started = *st.session.start_time_ms.get_or_insert_with(|| io.clock.now_ms());

    io.xy.step_increment(Direction::Increase);

    let r = if io.sensor.is_ready() {
        let mode = collect_mode(&mut *io.sensor, cfg.x_y_axis_check_times, cfg.valid_range());
        radius_for(cfg.vl53l1x_center, mode, tuning.fallback_radius)
    } else {
        io.clock.sleep_ms(tuning.fallback_delay_ms);
        tuning.fallback_radius
    };

    let angle = angle_for(st.session.xy_progress, cfg.degrees_per_microstep());
    let (x, y) = project(angle, r);
    st.session.z_progress = io.z.position();
    let z = f64::from(st.session.z_progress) * tuning.z_mm_per_step;

    st.session.point_count += 1;
    let elapsed_ms = io.clock.now_ms().saturating_sub(started);

    let mut points = heapless::Vec::new();
    let _ = points.push(ScanPoint { x, y, z });
    io.sink.emit(&TelemetryEvent::ScanProgress(ScanProgress {
        name: st.session.project_name.clone(),
        status: ScanStatus::Scan,
        points_count: st.session.point_count,
        time: elapsed_ms as f64 / 1000.0,
        is_last: false,
        z_steps: st.session.z_progress,
        r,
        points,
    }));

    st.session.xy_progress += io.xy.step_size().max(1);
    if st.session.xy_progress >= u32::from(cfg.x_y_axis_max) {
        io.z.step_increment(Direction::Increase);
        st.session.xy_progress = 0;
    }

    st.session.z_progress = io.z.position();
    if st.session.z_progress >= io.z.max() {
        info!(
            "SCANNING: Z reached {}, project '{}' complete",
            st.session.z_progress, st.session.project_name
        );
        st.session.project_name.clear();
        return Some(StateId::Stop);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  MOVING: manual jog, one pulse per tick
// ═══════════════════════════════════════════════════════════════════════════

fn moving_enter(st: &mut ScannerState) {
    info!("MOVING: {:?} x{}", st.jog, st.move_remaining);
}

fn moving_exit(st: &mut ScannerState) {
    st.jog = None;
    st.move_remaining = 0;
}

fn moving_update(st: &mut ScannerState, io: &mut RigIo<'_>) -> Option<StateId> {
    let Some(jog) = st.jog else {
        return Some(StateId::Stop);
    };
    if st.move_remaining == 0 {
        return Some(StateId::Stop);
    }

    let axis = match jog.axis() {
        Axis::Z => &mut *io.z,
        Axis::Xy => &mut *io.xy,
    };
    axis.step(jog.direction());
    st.session.z_progress = io.z.position();

    st.move_remaining -= 1;
    (st.move_remaining == 0).then_some(StateId::Stop)
}
