//! Integration tests: PropService end-to-end with mock adapters.

use scapeprop::app::events::AppEvent;
use scapeprop::app::ports::StatusIndicator;
use scapeprop::app::commands::ControlCommand;
use scapeprop::config::{PropConfig, Variant};
use scapeprop::fsm::PuzzleState;
use scapeprop::link::reporter::ReportKind;
use scapeprop::link::supervisor::ConnectionState;

use crate::mock_hw::ManualClock;
use crate::rig::Rig;

fn completed_dispatches(rig: &Rig) -> usize {
    rig.link
        .requests_to("/dispatch")
        .iter()
        .filter(|r| r.contains("\"completed\":true"))
        .count()
}

/// Tap a toggle button: press, hold past the debounce window, release.
fn tap(rig: &mut Rig, index: usize) {
    rig.panel.set_level(index, true);
    rig.run_for(100, 10);
    rig.panel.set_level(index, false);
    rig.run_for(100, 10);
}

// ── Boot and handshake ────────────────────────────────────────

#[test]
fn first_tick_performs_handshake() {
    let mut rig = Rig::variant(Variant::ButtonPanel);
    assert!(rig.sink.contains(&AppEvent::Started(PuzzleState::Idle)));

    rig.tick();

    assert_eq!(rig.svc.connection_state(), ConnectionState::Connected);
    let connects = rig.link.requests_to("/connect");
    assert_eq!(connects.len(), 1);
    assert!(connects[0].contains(r#"{"id":"buttons-arduino","ip":"10.0.0.7","port":8080}"#));
    assert!(rig.sink.contains(&AppEvent::LinkUp));
    assert_eq!(rig.panel.status(), Some(StatusIndicator::Waiting));
}

#[test]
fn advertise_ip_overrides_local_address() {
    let mut config = PropConfig::for_variant(Variant::CablePanel);
    config.advertise_ip = Some("192.168.1.50".into());
    let mut rig = Rig::new(config, ManualClock::new());

    rig.tick();

    assert!(rig.link.requests_to("/connect")[0].contains(r#""ip":"192.168.1.50""#));
}

#[test]
fn unreachable_orchestrator_shows_offline() {
    let mut rig = Rig::variant(Variant::SimultaneousPress);
    rig.link.refuse = true;

    rig.tick();

    assert_eq!(rig.svc.connection_state(), ConnectionState::Disconnected);
    assert_eq!(rig.panel.status(), Some(StatusIndicator::Offline));
    assert!(rig.sink.contains(&AppEvent::ReportFailed(ReportKind::Connect)));
    assert!(rig.sink.contains(&AppEvent::ReconnectScheduled { delay_ms: 1_000 }));
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn bogus_command_is_rejected_and_state_unchanged() {
    let mut rig = Rig::variant(Variant::ButtonPanel);
    rig.tick();

    let response = rig.get("/control?command=bogus");

    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{response}");
    assert!(response.ends_with("Unknown command (use start, stop or restart)"));
    assert_eq!(rig.svc.state(), PuzzleState::Idle);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::RequestRejected(_))),
        1
    );
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::CommandApplied(_))), 0);
}

#[test]
fn post_without_content_length_is_rejected() {
    let mut rig = Rig::variant(Variant::ButtonPanel);
    rig.tick();

    let wire = rig.request("POST /control?command=start HTTP/1.1\r\nHost: prop\r\n\r\n");

    let response = wire.borrow().written_text();
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{response}");
    assert!(response.ends_with("Invalid Content-Length"));
    assert_eq!(rig.svc.state(), PuzzleState::Idle);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::CommandApplied(_))), 0);
}

#[test]
fn json_start_command_is_acknowledged() {
    let mut rig = Rig::variant(Variant::ButtonPanel);
    rig.tick();

    let wire = rig.request(
        "POST /control HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 19\r\n\r\n{\"command\":\"start\"}",
    );

    let response = wire.borrow().written_text();
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Type: application/json\r\n"));
    assert!(response.contains(r#""status":"ok","command":"start""#));
    assert!(wire.borrow().closed, "connection must be closed after responding");
    assert_eq!(rig.svc.state(), PuzzleState::ReadyCountdown);
}

#[test]
fn start_counts_down_then_activates() {
    let mut rig = Rig::variant(Variant::ButtonPanel);
    rig.tick();
    rig.clock.set_ms(10);
    rig.get("/control?command=start");
    assert_eq!(rig.svc.state(), PuzzleState::ReadyCountdown);
    assert!(rig.panel.ready_lamp());

    rig.at(10_009);
    assert_eq!(rig.svc.state(), PuzzleState::ReadyCountdown);

    rig.at(10_010);
    assert_eq!(rig.svc.state(), PuzzleState::Active);
    assert!(!rig.panel.ready_lamp());
    assert!(rig.sink.contains(&AppEvent::StateChanged {
        from: PuzzleState::ReadyCountdown,
        to: PuzzleState::Active,
    }));
}

#[test]
fn stop_returns_to_idle_and_stops_sampling() {
    let mut rig = Rig::variant(Variant::SimultaneousPress);
    rig.tick();
    assert_eq!(rig.svc.state(), PuzzleState::Active);

    rig.get("/control?command=stop");
    assert_eq!(rig.svc.state(), PuzzleState::Idle);

    rig.sink.clear();
    rig.panel.set_level(0, true);
    rig.run_for(200, 10);

    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::ChannelChanged { .. })), 0);
}

#[test]
fn restart_with_to_idle_policy_goes_idle() {
    let mut rig = Rig::variant(Variant::ButtonPanel);
    rig.tick();
    rig.get("/control?command=start");
    assert_eq!(rig.svc.state(), PuzzleState::ReadyCountdown);

    rig.get("/control?command=restart");
    assert_eq!(rig.svc.state(), PuzzleState::Idle);
}

// ── Probe ─────────────────────────────────────────────────────

#[test]
fn probe_echoes_time_with_latency_fields() {
    let mut rig = Rig::variant(Variant::CablePanel);
    rig.tick();

    let response = rig.get("/Ping?time=42");

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("PONG SENT time=42 "));
    let dt = response
        .split("dt_ms=")
        .nth(1)
        .and_then(|s| s.split_whitespace().next())
        .and_then(|s| s.parse::<f64>().ok())
        .expect("dt_ms field");
    assert!(dt >= 0.0);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::ProbeAnswered { .. })),
        1
    );
}

#[test]
fn probe_without_time_is_bad_request() {
    let mut rig = Rig::variant(Variant::CablePanel);
    let response = rig.get("/Ping");
    assert!(response.starts_with("HTTP/1.1 400"));
    assert!(response.ends_with("Missing time= parameter in /Ping"));
}

#[test]
fn probe_echo_goes_out_on_keepalive_link() {
    // The echo drains its stream for a few ms; the clock must move.
    let mut rig = Rig::new(
        PropConfig::for_variant(Variant::ButtonPanel),
        ManualClock::drifting(100),
    );
    rig.link.peer_closes = false;
    rig.tick();
    // Let the handshake drain window lapse so the slot is free.
    rig.at(60);

    rig.get("/Ping?time=7");

    let pongs: Vec<_> = rig
        .link
        .requests()
        .into_iter()
        .filter(|r| r.starts_with("GET /Pong?time=7&"))
        .collect();
    assert_eq!(pongs.len(), 1);
    assert!(pongs[0].contains("Connection: keep-alive"));

    // A second probe reuses the same connection.
    let opened = rig.link.opened.len();
    rig.clock.advance_ms(20);
    rig.get("/Ping?time=8");
    assert_eq!(rig.link.opened.len(), opened);
}

#[test]
fn probes_keep_probe_driven_link_alive() {
    let mut rig = Rig::variant(Variant::CablePanel);
    rig.tick();
    assert_eq!(rig.svc.connection_state(), ConnectionState::Connected);

    rig.clock.set_ms(5_000);
    rig.get("/Ping?time=1");

    rig.at(12_999);
    assert_eq!(rig.svc.connection_state(), ConnectionState::Connected);

    rig.at(13_000);
    assert_eq!(rig.svc.connection_state(), ConnectionState::Disconnected);
    assert!(rig.sink.contains(&AppEvent::LinkDown));
    assert_eq!(rig.panel.status(), Some(StatusIndicator::Offline));

    // Lost link is retried on the very next pass.
    rig.at(13_001);
    assert_eq!(rig.link.requests_to("/connect").len(), 2);
}

// ── Heartbeat ─────────────────────────────────────────────────

#[test]
fn heartbeat_sent_on_interval() {
    let mut rig = Rig::variant(Variant::ButtonPanel);
    rig.tick();

    rig.at(4_999);
    assert!(rig.link.requests_to("/heartbeat").is_empty());

    rig.at(5_000);
    let beats = rig.link.requests_to("/heartbeat");
    assert_eq!(beats.len(), 1);
    assert!(beats[0].ends_with(r#"{"arduinoId":"buttons-arduino"}"#));
}

#[test]
fn failed_heartbeat_drops_link() {
    let mut rig = Rig::variant(Variant::ButtonPanel);
    rig.tick();
    rig.link.refuse = true;

    rig.at(5_000);

    assert!(rig.sink.contains(&AppEvent::ReportFailed(ReportKind::Heartbeat)));
    assert!(rig.sink.contains(&AppEvent::LinkDown));
    assert_eq!(rig.svc.connection_state(), ConnectionState::Disconnected);
}

// ── Completion ────────────────────────────────────────────────

#[test]
fn correct_buttons_complete_once() {
    let mut rig = Rig::variant(Variant::ButtonPanel);
    rig.tick();
    rig.get("/control?command=start");
    rig.at(10_000);
    assert_eq!(rig.svc.state(), PuzzleState::Active);

    tap(&mut rig, 0);
    assert_eq!(rig.svc.state(), PuzzleState::Active);
    tap(&mut rig, 2);
    assert_eq!(rig.svc.state(), PuzzleState::Completed);

    rig.run_for(500, 10);

    assert_eq!(completed_dispatches(&rig), 1);
    let last = rig.link.requests_to("/dispatch").pop().unwrap_or_default();
    assert!(last.contains(r#""arduinoId":"buttons-arduino","event":"buttons:state-changed""#));
    assert!(last.contains(r#""lastPressed":3"#));
    assert!(last.contains(r#"{"id":1,"pressed":true}"#));
    assert!(last.contains(r#"{"id":2,"pressed":false}"#));
    assert_eq!(rig.sink.count(|e| *e == AppEvent::Completed), 1);
    assert!(rig.panel.solved_lamp());
    assert_eq!(rig.panel.status(), Some(StatusIndicator::Latched));
}

#[test]
fn button_held_through_start_is_not_a_press() {
    let mut rig = Rig::variant(Variant::ButtonPanel);
    rig.tick();
    rig.panel.set_level(0, true);
    rig.get("/control?command=start");
    rig.at(10_000);
    rig.sink.clear();

    rig.run_for(200, 10);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::ChannelChanged { .. })), 0);
    assert!(!rig.panel.channel_lamp(0));

    rig.panel.set_level(0, false);
    rig.run_for(100, 10);
    tap(&mut rig, 0);
    assert!(rig.panel.channel_lamp(0));
}

#[test]
fn wrong_button_keeps_puzzle_open() {
    let mut rig = Rig::variant(Variant::ButtonPanel);
    rig.tick();
    rig.get("/control?command=start");
    rig.at(10_000);

    tap(&mut rig, 0);
    tap(&mut rig, 1);
    tap(&mut rig, 2);

    assert_eq!(rig.svc.state(), PuzzleState::Active);
    assert!(rig.panel.channel_lamp(1));
    assert_eq!(completed_dispatches(&rig), 0);
    // State changes were still reported.
    assert!(!rig.link.requests_to("/dispatch").is_empty());
}

#[test]
fn completion_survives_failed_delivery() {
    let mut rig = Rig::variant(Variant::SimultaneousPress);
    rig.tick();
    rig.link.refuse = true;

    for i in 0..6 {
        rig.panel.set_level(i, true);
    }
    rig.run_for(10, 10);
    assert_eq!(rig.svc.state(), PuzzleState::Completed);
    assert_eq!(rig.svc.pending_reports(), 1);

    rig.run_for(20, 10);
    assert!(rig.sink.contains(&AppEvent::ReportFailed(ReportKind::Completion)));
    assert_eq!(rig.svc.pending_reports(), 1);
    assert_eq!(completed_dispatches(&rig), 0);

    rig.link.refuse = false;
    rig.run_for(1_500, 10);

    assert_eq!(completed_dispatches(&rig), 1);
    assert_eq!(rig.svc.pending_reports(), 0);
    assert_eq!(
        rig.sink
            .count(|e| *e == AppEvent::ReportSent(ReportKind::Completion)),
        1
    );

    rig.run_for(2_000, 50);
    assert_eq!(completed_dispatches(&rig), 1);
}

#[test]
fn report_in_flight_holds_the_slot() {
    let mut rig = Rig::variant(Variant::CablePanel);
    rig.link.peer_closes = false;
    rig.tick();
    assert!(rig.svc.is_reporting());

    for (i, ohms) in [3_300.0, 4_800.0, 6_800.0, 10_000.0, 15_200.0].into_iter().enumerate() {
        rig.panel.set_ohms(i, ohms);
    }
    rig.run_for(400, 10);
    assert_eq!(rig.svc.state(), PuzzleState::Completed);

    // Probes are still answered while the handshake drains.
    let response = rig.get("/Ping?time=5");
    assert!(response.contains("time=5"));

    rig.at(2_999);
    assert_eq!(rig.link.opened.len(), 1, "nothing opened while the slot is held");

    rig.at(3_000);
    rig.at(3_001);
    assert_eq!(rig.link.opened.len(), 2);
    let dispatch = rig.link.requests_to("/dispatch");
    assert_eq!(dispatch.len(), 1);
    assert!(dispatch[0].contains(r#""totalConnections":5,"correctConnections":5,"completed":true"#));
}

#[test]
fn tag_reader_starts_on_connect_and_completes() {
    let mut rig = Rig::variant(Variant::TagReader);
    assert!(rig.sink.contains(&AppEvent::Started(PuzzleState::Idle)));

    rig.tick();
    assert_eq!(rig.svc.state(), PuzzleState::Active);
    assert!(rig.sink.contains(&AppEvent::CommandApplied(ControlCommand::Start)));

    for (i, tag) in ["04:A1", "04:B2", "04:C3", "04:D4", "04:E5"].iter().enumerate() {
        rig.panel.set_tag(i, Some(tag));
    }
    rig.run_for(100, 20);

    assert_eq!(rig.svc.state(), PuzzleState::Completed);
    let dispatch = rig.link.requests_to("/dispatch").pop().unwrap_or_default();
    assert!(dispatch.contains(r#"{"id":"Lector1","name":"04:A1","slot":1,"detected":true}"#));
    assert!(dispatch.contains(r#""detectedBadges":5,"completed":true"#));
}

#[test]
fn duplicate_tags_do_not_complete() {
    let mut rig = Rig::variant(Variant::TagReader);
    rig.tick();

    for i in 0..5 {
        rig.panel.set_tag(i, Some("04:A1"));
    }
    rig.run_for(100, 20);

    assert_eq!(rig.svc.state(), PuzzleState::Active);
    assert_eq!(completed_dispatches(&rig), 0);
}

// ── Reconnect ─────────────────────────────────────────────────

#[test]
fn backoff_doubles_and_reinitialises() {
    let mut rig = Rig::variant(Variant::TagReader);
    rig.link.refuse = true;

    rig.at(0);
    assert_eq!(rig.link.open_attempts, 1);
    assert!(rig.sink.contains(&AppEvent::ReconnectScheduled { delay_ms: 2_000 }));

    rig.at(1_999);
    assert_eq!(rig.link.open_attempts, 1);
    rig.at(2_000);
    assert_eq!(rig.link.open_attempts, 2);
    assert!(rig.sink.contains(&AppEvent::ReconnectScheduled { delay_ms: 4_000 }));

    rig.at(5_999);
    assert_eq!(rig.link.open_attempts, 2);
    rig.at(6_000);
    assert_eq!(rig.link.open_attempts, 3);
    assert_eq!(rig.link.reinit_count, 1);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::PeripheralReset), 1);
    assert!(rig.sink.contains(&AppEvent::ReconnectScheduled { delay_ms: 8_000 }));

    rig.at(13_999);
    assert_eq!(rig.link.open_attempts, 3);
    assert_eq!(rig.svc.state(), PuzzleState::Idle);

    rig.link.refuse = false;
    rig.at(14_000);
    assert_eq!(rig.svc.connection_state(), ConnectionState::Connected);
    // Auto-start waits for the first successful handshake.
    assert_eq!(rig.svc.state(), PuzzleState::Active);
}

#[test]
fn restart_resets_backoff() {
    let mut rig = Rig::variant(Variant::TagReader);
    rig.link.refuse = true;
    rig.at(0);
    rig.at(2_000);
    rig.at(6_000);
    assert!(rig.sink.contains(&AppEvent::ReconnectScheduled { delay_ms: 8_000 }));

    rig.clock.set_ms(7_000);
    rig.get("/control?command=restart");

    rig.sink.clear();
    rig.at(14_000);
    assert!(rig.sink.contains(&AppEvent::ReconnectScheduled { delay_ms: 2_000 }));
}
