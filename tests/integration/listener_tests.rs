//! Integration tests: slow, partial, and oversized inbound requests.
//!
//! These run on a drifting clock so each phase timeout actually elapses.

use scapeprop::app::events::AppEvent;
use scapeprop::config::{PropConfig, Variant};
use scapeprop::fsm::PuzzleState;

use crate::mock_hw::ManualClock;
use crate::rig::Rig;

/// Button panel on a clock that moves 1 ms per read.
fn make_rig() -> Rig {
    let mut rig = Rig::new(
        PropConfig::for_variant(Variant::ButtonPanel),
        ManualClock::drifting(1_000),
    );
    rig.tick();
    rig.sink.clear();
    rig
}

fn send_chunks(rig: &mut Rig, chunks: &[&[u8]], hang_up: bool) -> String {
    let wire = rig.inbound.push_chunks(chunks, hang_up);
    rig.tick();
    let text = wire.borrow().written_text();
    assert!(wire.borrow().closed, "inbound connection left open");
    text
}

// ── Dropped without a response ────────────────────────────────

#[test]
fn silent_client_gets_no_response() {
    let mut rig = make_rig();

    let response = send_chunks(&mut rig, &[], false);

    assert!(response.is_empty());
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::RequestRejected(_))), 0);
}

#[test]
fn hang_up_mid_request_line_is_dropped() {
    let mut rig = make_rig();

    let response = send_chunks(&mut rig, &[b"GET /contr"], true);

    assert!(response.is_empty());
    assert_eq!(rig.svc.state(), PuzzleState::Idle);
}

// ── Partial headers ───────────────────────────────────────────

#[test]
fn get_with_stalled_headers_is_still_served() {
    let mut rig = make_rig();

    let response = send_chunks(
        &mut rig,
        &[b"GET /control?command=start HTTP/1.1\r\nHost: pr"],
        false,
    );

    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert_eq!(rig.svc.state(), PuzzleState::ReadyCountdown);
}

#[test]
fn post_with_stalled_headers_is_rejected() {
    let mut rig = make_rig();

    let response = send_chunks(
        &mut rig,
        &[b"POST /control HTTP/1.1\r\nContent-Length: 19\r\n"],
        false,
    );

    assert!(response.starts_with("HTTP/1.1 400"));
    assert!(response.ends_with("Headers incomplete"));
    assert!(rig.sink.contains(&AppEvent::RequestRejected("Headers incomplete")));
    assert_eq!(rig.svc.state(), PuzzleState::Idle);
}

// ── Body ──────────────────────────────────────────────────────

#[test]
fn short_body_is_rejected() {
    let mut rig = make_rig();

    let response = send_chunks(
        &mut rig,
        &[b"POST /control HTTP/1.1\r\nContent-Length: 19\r\n\r\n{\"command\""],
        false,
    );

    assert!(response.ends_with("Body incomplete"), "{response}");
    assert_eq!(rig.svc.state(), PuzzleState::Idle);
}

#[test]
fn oversized_body_is_rejected_before_reading_it() {
    let mut rig = make_rig();

    let response = send_chunks(
        &mut rig,
        &[b"POST /control HTTP/1.1\r\nContent-Length: 4096\r\n\r\n"],
        false,
    );

    assert!(response.starts_with("HTTP/1.1 400"));
    assert!(response.ends_with("Body too large"));
}

#[test]
fn request_trickled_in_small_pieces_is_served() {
    let mut rig = make_rig();

    let response = send_chunks(
        &mut rig,
        &[
            b"POST /con",
            b"trol HTTP/1.1\r\nConte",
            b"nt-Length: 19\r\n",
            b"\r\n{\"comma",
            b"nd\":\"start\"}",
        ],
        false,
    );

    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert_eq!(rig.svc.state(), PuzzleState::ReadyCountdown);
}

#[test]
fn invalid_json_body_is_rejected() {
    let mut rig = make_rig();

    let response = send_chunks(
        &mut rig,
        &[b"POST /control HTTP/1.1\r\nContent-Length: 9\r\n\r\n{command}"],
        false,
    );

    assert!(response.ends_with("Invalid JSON body"));
}

#[test]
fn unknown_endpoint_lists_supported_routes() {
    let mut rig = make_rig();

    let response = send_chunks(&mut rig, &[b"GET /status HTTP/1.1\r\n\r\n"], false);

    assert!(response.starts_with("HTTP/1.1 400"));
    assert!(response.ends_with("Use POST /control or GET /Ping?time=123"));
}

// ── One request per tick ──────────────────────────────────────

#[test]
fn one_connection_served_per_tick() {
    let mut rig = make_rig();
    let first = rig
        .inbound
        .push_request("GET /control?command=start HTTP/1.1\r\n\r\n");
    let second = rig
        .inbound
        .push_request("GET /control?command=stop HTTP/1.1\r\n\r\n");

    rig.tick();
    assert!(!first.borrow().written.is_empty());
    assert!(second.borrow().written.is_empty());
    assert_eq!(rig.inbound.pending(), 1);

    rig.tick();
    assert!(!second.borrow().written.is_empty());
    assert_eq!(rig.svc.state(), PuzzleState::Idle);
}
