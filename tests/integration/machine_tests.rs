//! Integration tests for the command machine driving real `MotorAxis`
//! drivers over mock GPIO.

use crate::mock_hw::{FakeClock, RecordingSink, ScriptedSensor, rig, rig_with_switch, small_config};

use scanrig::app::commands::{ScanCommand, project_name};
use scanrig::app::events::TelemetryEvent;
use scanrig::app::ports::AxisPort;
use scanrig::fsm::{ScanCommandMachine, StateId};

fn machine() -> ScanCommandMachine {
    let mut m = ScanCommandMachine::new(small_config());
    m.start();
    m
}

// ── Homing ────────────────────────────────────────────────────

#[test]
fn home_from_zero_with_open_switch_runs_full_travel() {
    let mut m = machine();
    let (mut rig, counters) = rig(ScriptedSensor::offline());
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    assert!(m.set_command(ScanCommand::Home, 0));
    m.tick(&mut rig, &mut clock, &mut sink);

    assert_eq!(m.current_state(), StateId::Stop);
    assert_eq!(counters.z_pulses.get(), 40, "one pulse per microstep of travel");
    assert!(!counters.z_dir_up.get(), "homing drives down");
    assert_eq!(rig.z.position(), 0);
    assert_eq!(m.z_position(), 0);
}

#[test]
fn home_stops_on_switch() {
    let mut m = machine();
    let (mut rig, counters) = rig_with_switch(ScriptedSensor::offline(), Some(7));
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    m.set_command(ScanCommand::Home, 0);
    m.tick(&mut rig, &mut clock, &mut sink);

    assert_eq!(counters.z_pulses.get(), 7);
    assert_eq!(rig.z.position(), 0, "switch contact is the new zero");
    assert_eq!(m.current_state(), StateId::Stop);
}

// ── Scanning ──────────────────────────────────────────────────

#[test]
fn scan_without_name_stays_stopped_and_silent() {
    let mut m = machine();
    let (mut rig, counters) = rig(ScriptedSensor::steady(60));
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    assert!(!m.set_command(ScanCommand::Start, 0));
    assert!(!m.set_command(ScanCommand::NewProject, 0));
    for _ in 0..5 {
        m.tick(&mut rig, &mut clock, &mut sink);
        assert_eq!(m.current_state(), StateId::Stop);
    }
    assert_eq!(sink.scan_points(), 0);
    assert_eq!(counters.xy_pulses.get(), 0);
}

#[test]
fn offline_sensor_emits_one_fallback_point_per_tick() {
    let mut m = machine();
    let (mut rig, counters) = rig(ScriptedSensor::offline());
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    m.set_project_name(project_name("cup"));
    m.set_command(ScanCommand::Start, 0);
    m.tick(&mut rig, &mut clock, &mut sink);

    assert_eq!(sink.events.len(), 1);
    let TelemetryEvent::ScanProgress(p) = &sink.events[0] else {
        panic!("expected a scan point, got {:?}", sink.events[0]);
    };
    assert_eq!(p.r, 20.0);
    assert_eq!(p.points_count, 1);
    assert_eq!(p.name.as_str(), "cup");
    assert_eq!(clock.slept_ms, 800, "fallback delay replaces the measurement");
    assert_eq!(counters.sensor_calls.get(), 0);
}

#[test]
fn ready_sensor_that_never_delivers_falls_back_after_attempt_budget() {
    let mut m = machine();
    let (mut rig, counters) = rig(ScriptedSensor::scripted(&[]));
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    m.set_project_name(project_name("cup"));
    m.set_command(ScanCommand::Start, 0);
    m.tick(&mut rig, &mut clock, &mut sink);

    assert_eq!(sink.events.len(), 1);
    let TelemetryEvent::ScanProgress(p) = &sink.events[0] else {
        panic!("expected a scan point, got {:?}", sink.events[0]);
    };
    assert_eq!(p.r, 20.0);
    assert_eq!(p.points_count, 1);
    // One accepted sample wanted, sixteen attempts allowed.
    assert_eq!(counters.sensor_calls.get(), 16);
    assert_eq!(clock.slept_ms, 0, "the sampling window already took the time");
    assert_eq!(m.current_state(), StateId::Scanning);
}

#[test]
fn ready_sensor_radius_is_distance_from_center() {
    let mut m = machine();
    let (mut rig, _) = rig(ScriptedSensor::steady(45));
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    m.set_project_name(project_name("cup"));
    m.set_command(ScanCommand::Start, 0);
    m.tick(&mut rig, &mut clock, &mut sink);

    let point = sink.events[0].point().copied().unwrap();
    assert_eq!(point.x, 25.0, "first point sits at angle 0");
    assert_eq!(point.y, 0.0);
    assert_eq!(point.z, 0.0);
    assert_eq!(clock.slept_ms, 0);
}

#[test]
fn filter_discards_outliers_during_scan() {
    let mut m = ScanCommandMachine::new(scanrig::config::ScannerConfig {
        x_y_axis_check_times: 3,
        ..small_config()
    });
    m.start();
    let (mut rig, counters) = rig(ScriptedSensor::scripted(&[
        Some(70),
        Some(71),
        Some(70),
        Some(999),
        Some(70),
    ]));
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    m.set_project_name(project_name("p"));
    m.set_command(ScanCommand::NewProject, 0);
    m.tick(&mut rig, &mut clock, &mut sink);

    let TelemetryEvent::ScanProgress(p) = &sink.events[0] else {
        panic!("expected a scan point");
    };
    // Mode 70 equals the center, so the radius is 0.
    assert_eq!(p.r, 0.0);
    assert_eq!(counters.sensor_calls.get(), 3);
}

#[test]
fn completing_a_ring_lifts_z_once() {
    let mut m = machine();
    let (mut rig, counters) = rig(ScriptedSensor::offline());
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    m.set_project_name(project_name("vase"));
    m.set_command(ScanCommand::Start, 0);

    // 32 microsteps per ring at 8 per point: four points per ring.
    for _ in 0..3 {
        m.tick(&mut rig, &mut clock, &mut sink);
    }
    assert_eq!(counters.z_pulses.get(), 0);
    assert_eq!(m.state().session.xy_progress, 24);

    m.tick(&mut rig, &mut clock, &mut sink);
    assert_eq!(counters.z_pulses.get(), 20, "exactly one layer step");
    assert!(counters.z_dir_up.get());
    assert_eq!(m.state().session.xy_progress, 0);
    assert_eq!(counters.xy_pulses.get(), 32);
    assert_eq!(m.current_state(), StateId::Scanning);
    assert_eq!(m.z_position(), 20);
}

#[test]
fn reaching_z_max_clears_name_and_stops_same_tick() {
    let mut m = machine();
    let (mut rig, counters) = rig(ScriptedSensor::offline());
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    m.set_project_name(project_name("vase"));
    m.set_command(ScanCommand::Start, 0);
    for _ in 0..7 {
        m.tick(&mut rig, &mut clock, &mut sink);
        assert_eq!(m.current_state(), StateId::Scanning);
    }
    m.tick(&mut rig, &mut clock, &mut sink);

    assert_eq!(m.current_state(), StateId::Stop);
    assert!(m.state().session.project_name.is_empty());
    assert_eq!(counters.z_pulses.get(), 40);
    assert_eq!(sink.scan_points(), 8);

    // The next tick is a plain Stop heartbeat.
    m.tick(&mut rig, &mut clock, &mut sink);
    assert_eq!(sink.heartbeats(), 1);
    assert_eq!(sink.scan_points(), 8);
}

#[test]
fn scan_points_carry_elapsed_time() {
    let mut m = machine();
    let (mut rig, _) = rig(ScriptedSensor::offline());
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());
    clock.now_ms = 5_000;

    m.set_project_name(project_name("t"));
    m.set_command(ScanCommand::Start, 0);
    m.tick(&mut rig, &mut clock, &mut sink);
    m.tick(&mut rig, &mut clock, &mut sink);

    let times: Vec<f64> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            TelemetryEvent::ScanProgress(p) => Some(p.time),
            TelemetryEvent::Heartbeat(_) => None,
        })
        .collect();
    // Each offline point costs the 800 ms fallback delay.
    assert_eq!(times, vec![0.8, 1.6]);
}

// ── Stop heartbeat ────────────────────────────────────────────

#[test]
fn heartbeat_reports_z_and_distance() {
    let mut m = machine();
    let (mut rig, _) = rig(ScriptedSensor::steady(68));
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    m.set_command(ScanCommand::StepUp, 3);
    for _ in 0..3 {
        m.tick(&mut rig, &mut clock, &mut sink);
    }
    assert_eq!(m.current_state(), StateId::Stop);
    m.tick(&mut rig, &mut clock, &mut sink);

    assert_eq!(
        sink.events.last().map(|e| e.to_json().unwrap()),
        Some(r#"{"z_steps":3,"vl53l1x":68,"name":"","status":"stop"}"#.to_owned())
    );
}

// ── Manual jog ────────────────────────────────────────────────

#[test]
fn jog_left_turns_table_without_tracking() {
    let mut m = machine();
    let (mut rig, counters) = rig(ScriptedSensor::offline());
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    m.set_command(ScanCommand::StepLeft, 4);
    for _ in 0..4 {
        m.tick(&mut rig, &mut clock, &mut sink);
    }
    assert_eq!(counters.xy_pulses.get(), 4);
    assert_eq!(rig.xy.position(), 0);
    assert_eq!(m.current_state(), StateId::Stop);
}

#[test]
fn jog_down_at_zero_is_a_silent_no_op() {
    let mut m = machine();
    let (mut rig, counters) = rig(ScriptedSensor::offline());
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    m.set_command(ScanCommand::StepDown, 2);
    m.tick(&mut rig, &mut clock, &mut sink);
    m.tick(&mut rig, &mut clock, &mut sink);

    assert_eq!(counters.z_pulses.get(), 0);
    assert_eq!(m.current_state(), StateId::Stop);
}

#[test]
fn jog_up_stops_at_max() {
    let mut m = machine();
    let (mut rig, counters) = rig(ScriptedSensor::offline());
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    m.set_command(ScanCommand::StepUp, 50);
    for _ in 0..50 {
        m.tick(&mut rig, &mut clock, &mut sink);
    }
    assert_eq!(counters.z_pulses.get(), 40);
    assert_eq!(m.z_position(), 40);
}

#[test]
fn z_jog_keeps_session_z_in_step_with_the_axis() {
    let mut m = machine();
    let (mut rig, _) = rig(ScriptedSensor::offline());
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    m.set_command(ScanCommand::StepUp, 3);
    m.tick(&mut rig, &mut clock, &mut sink);
    assert_eq!(m.state().session.z_progress, 1);
    m.tick(&mut rig, &mut clock, &mut sink);
    m.tick(&mut rig, &mut clock, &mut sink);
    assert_eq!(m.state().session.z_progress, 3);

    m.set_command(ScanCommand::StepDown, 1);
    m.tick(&mut rig, &mut clock, &mut sink);
    assert_eq!(m.state().session.z_progress, 2);
    assert_eq!(m.state().session.z_progress, rig.z.position());
}
