//! End-to-end tests: the full session lifecycle over the simulated wire.
//!
//! Every byte here travels as clock edges through the bit engine - the
//! handshake commands are clocked out bit by bit and the device replies
//! are clocked back in, exactly as they would be on the connector.

use ps2com::ps2::sim::{frame_levels, SimBus, SimMouse};
use ps2com::ps2::{reply, PortCell, Ps2Port};
use ps2com::{MotionReport, MouseSession, PortState, SessionConfig, SessionState};

fn port(bus: SimBus) -> PortCell<SimBus> {
    let cell = PortCell::new(Ps2Port::new(bus));
    cell.init();
    cell
}

/// Clock motion packets onto the wire.
fn stream(cell: &PortCell<SimBus>, packets: &[&[u8]]) {
    cell.with(|p| {
        for packet in packets {
            p.bus_mut().push_packet(packet);
        }
    });
}

#[test]
fn plain_mouse_lifecycle() {
    let cell = port(SimBus::with_device(SimMouse::new()));
    let mut session = MouseSession::new(&cell, SessionConfig::default());

    session.start().expect("handshake should succeed");
    assert_eq!(session.state(), SessionState::Streaming);
    assert!(!session.wheel_active());

    // Left press with movement, then release with movement.
    stream(&cell, &[&[0x01, 5, 0], &[0x00, 0xFD, 0xFD]]);
    assert!(session.process());

    let report = session.take_report().expect("motion accumulated");
    assert_eq!(
        report,
        MotionReport {
            buttons: 0,
            x: 2,
            y: 3,
            wheel: 0
        }
    );
    assert_eq!(session.take_report(), None);
}

#[test]
fn wheel_mouse_lifecycle() {
    let cell = port(SimBus::with_device(SimMouse::with_wheel()));
    let config = SessionConfig {
        detect_wheel: true,
        ..SessionConfig::default()
    };
    let mut session = MouseSession::new(&cell, config);

    session.start().expect("handshake should succeed");
    assert!(session.wheel_active());

    // Middle button, scroll down two notches.
    stream(&cell, &[&[0x04, 0, 0, 0xFE]]);
    assert!(session.process());

    let report = session.take_report().expect("wheel motion accumulated");
    assert_eq!(report.buttons, 0x04);
    assert_eq!(report.wheel, -2);
    assert_eq!((report.x, report.y), (0, 0));
}

#[test]
fn wheel_report_clamps_to_link_field() {
    let cell = port(SimBus::with_device(SimMouse::with_wheel()));
    let config = SessionConfig {
        detect_wheel: true,
        ..SessionConfig::default()
    };
    let mut session = MouseSession::new(&cell, config);
    session.start().unwrap();

    stream(&cell, &[&[0, 0, 0, 20]]);
    assert!(session.process());

    // 20 notches drain as 7 + 7 + 6: the link wheel field is 4 bits.
    assert_eq!(session.take_report().unwrap().wheel, 7);
    assert_eq!(session.take_report().unwrap().wheel, 7);
    assert_eq!(session.take_report().unwrap().wheel, 6);
    assert_eq!(session.take_report(), None);
}

#[test]
fn desync_recovers_with_full_rehandshake() {
    let cell = port(SimBus::with_device(SimMouse::new()));
    let mut session = MouseSession::new(&cell, SessionConfig::default());
    session.start().unwrap();

    stream(&cell, &[&[0x01, 10, 0]]);
    assert!(session.process());

    // A corrupted frame mid-stream desynchronizes the port.
    cell.with(|p| {
        let mut levels = frame_levels(0x10);
        levels[9] = !levels[9];
        p.bus_mut().push_levels(&levels);
    });
    assert!(session.process());
    assert_eq!(session.error_count(), 1);
    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(cell.state(), PortState::Read);

    // The re-handshake dropped undelivered motion; streaming works again.
    stream(&cell, &[&[0x00, 3, 0]]);
    assert!(session.process());
    let report = session.take_report().unwrap();
    assert_eq!((report.x, report.y, report.buttons), (3, 0, 0));
}

#[test]
fn failed_device_retries_until_it_heals() {
    let mut mouse = SimMouse::new();
    mouse.self_test_reply = 0x55;
    let cell = port(SimBus::with_device(mouse));
    let mut session = MouseSession::new(&cell, SessionConfig::default());

    assert!(session.start().is_err());
    assert_eq!(cell.state(), PortState::Error);

    // Recovery is retried on every process call, without bound.
    assert!(!session.process());
    assert!(!session.process());
    assert_eq!(session.error_count(), 2);

    // Once the device answers properly, the next retry brings the
    // session up.
    cell.with(|p| {
        p.bus_mut().device_mut().unwrap().self_test_reply = reply::SELF_TEST_PASS;
    });
    assert!(session.process());
    assert_eq!(session.error_count(), 3);
    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(cell.state(), PortState::Read);
}

#[test]
fn quiet_session_produces_no_reports() {
    let cell = port(SimBus::with_device(SimMouse::new()));
    let mut session = MouseSession::new(&cell, SessionConfig::default());
    session.start().unwrap();

    for _ in 0..10 {
        assert!(session.process());
        assert_eq!(session.take_report(), None);
    }
    assert_eq!(session.error_count(), 0);
}
