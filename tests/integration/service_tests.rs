//! Integration tests for the ingress → service → telemetry pipeline.
//!
//! Frames arrive as web-socket JSON, travel through the command channel,
//! drive the rig, and leave as JSON on the telemetry channel.

use crate::mock_hw::{FakeClock, MockNvs, RecordingSink, ScriptedSensor, rig, small_config};

use scanrig::adapters::channel_sink::ChannelTelemetrySink;
use scanrig::adapters::nvs::NvsAdapter;
use scanrig::app::commands::CommandRequest;
use scanrig::app::ports::{AxisPort, ConfigPort};
use scanrig::app::service::ScannerService;
use scanrig::channels::{CommandChannel, TelemetryChannel};
use scanrig::config::ScannerConfig;
use scanrig::fsm::StateId;

fn push(ch: &CommandChannel, frame: &str) {
    let req = CommandRequest::from_json(frame.as_bytes()).unwrap();
    assert!(ch.try_send(req).is_ok(), "command queue full");
}

#[test]
fn boot_homes_then_idles() {
    let mut svc = ScannerService::new(small_config());
    let (mut rig, counters) = rig(ScriptedSensor::offline());
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    svc.start();
    svc.tick(&mut rig, &mut clock, &mut sink);
    assert_eq!(svc.current_state(), StateId::Stop);
    assert_eq!(counters.z_pulses.get(), 40);
    assert_eq!(svc.z_position(), 0);

    svc.tick(&mut rig, &mut clock, &mut sink);
    assert_eq!(sink.heartbeats(), 1);
}

#[test]
fn json_frames_drive_a_scan_to_completion() {
    let commands = CommandChannel::new();
    let telemetry = TelemetryChannel::new();
    let mut svc = ScannerService::new(small_config());
    let (mut rig, _) = rig(ScriptedSensor::steady(50));
    let mut clock = FakeClock::default();
    let mut sink = ChannelTelemetrySink::new(&telemetry);

    push(&commands, r#"{"name":"vase"}"#);
    push(&commands, r#"{"command":"start"}"#);
    assert_eq!(svc.drain_commands(&commands), 2);
    assert_eq!(svc.current_state(), StateId::Scanning);

    let mut frames = Vec::new();
    for _ in 0..8 {
        svc.tick(&mut rig, &mut clock, &mut sink);
        while let Ok(frame) = telemetry.try_receive() {
            frames.push(frame);
        }
    }

    assert_eq!(svc.current_state(), StateId::Stop);
    assert_eq!(frames.len(), 8);
    assert!(frames[0].starts_with(r#"{"name":"vase","status":"scan","points_count":1,"#));
    assert!(frames[7].contains(r#""points_count":8,"#));
    assert!(frames[7].contains(r#""r":20.0,"#));
    assert_eq!(sink.dropped(), 0);
}

#[test]
fn jog_frame_with_steps() {
    let commands = CommandChannel::new();
    let mut svc = ScannerService::new(small_config());
    let (mut rig, counters) = rig(ScriptedSensor::offline());
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    push(&commands, r#"{"command":"up","steps":5}"#);
    svc.drain_commands(&commands);
    while svc.current_state() == StateId::Moving {
        svc.tick(&mut rig, &mut clock, &mut sink);
    }
    assert_eq!(counters.z_pulses.get(), 5);
    assert_eq!(svc.z_position(), 5);
}

#[test]
fn numeric_stop_interrupts_a_scan() {
    let commands = CommandChannel::new();
    let mut svc = ScannerService::new(small_config());
    let (mut rig, _) = rig(ScriptedSensor::offline());
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());

    push(&commands, r#"{"name":"bowl"}"#);
    push(&commands, r#"{"command":3}"#);
    svc.drain_commands(&commands);
    svc.tick(&mut rig, &mut clock, &mut sink);
    assert_eq!(sink.scan_points(), 1);

    push(&commands, r#"{"command":0}"#);
    svc.drain_commands(&commands);
    assert_eq!(svc.current_state(), StateId::Stop);
    assert_eq!(svc.state().session.project_name.as_str(), "bowl");
}

#[test]
fn runtime_config_reaches_axes_and_persists() {
    let commands = CommandChannel::new();
    let mut svc = ScannerService::new(small_config());
    let (mut rig, _) = rig(ScriptedSensor::offline());
    let (mut clock, mut sink) = (FakeClock::default(), RecordingSink::default());
    let mut nvs = MockNvs::default();

    svc.tick(&mut rig, &mut clock, &mut sink);
    assert_eq!(rig.z.max(), 40);

    let update = ScannerConfig {
        z_axis_max: 400,
        ..small_config()
    };
    let frame = format!(r#"{{"config":{}}}"#, serde_json::to_string(&update).unwrap());
    push(&commands, &frame);
    svc.drain_commands(&commands);
    assert!(svc.is_config_dirty());

    svc.tick(&mut rig, &mut clock, &mut sink);
    assert_eq!(rig.z.max(), 400);

    assert!(svc.save_if_dirty(&mut nvs));
    assert!(!svc.save_if_dirty(&mut nvs));
    assert_eq!(nvs.saves, 1);
    assert_eq!(nvs.load().z_axis_max, 400);
}

#[test]
fn config_survives_reboot_through_nvs() {
    let mut nvs = NvsAdapter::new().unwrap();
    let mut svc = ScannerService::new(nvs.load());
    svc.handle_request(CommandRequest::UpdateConfig(ScannerConfig {
        vl53l1x_center: 120,
        x_y_axis_check_times: 4,
        ..ScannerConfig::default()
    }));
    assert!(svc.save_if_dirty(&mut nvs));

    let rebooted = ScannerService::new(nvs.load());
    let cfg = rebooted.current_config();
    assert_eq!(cfg.vl53l1x_center, 120);
    assert_eq!(cfg.x_y_axis_check_times, 4);
    assert_eq!(cfg.valid_range(), (50, 190));
}

#[test]
fn malformed_frames_are_rejected_at_the_boundary() {
    for frame in [
        "",
        "not json",
        r#"{"command":"sideways"}"#,
        r#"{"command":42}"#,
        r#"{"save":false}"#,
    ] {
        assert!(
            CommandRequest::from_json(frame.as_bytes()).is_err(),
            "accepted {:?}",
            frame
        );
    }
}
