//! Tests requiring actual serial hardware.
//!
//! These tests are skipped if no hardware is available.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=COM3                  # or /dev/ttyUSB0 on Linux
//! export TEST_BAUD=9600                  # optional, default: 9600
//! export TEST_LOOPBACK=1                 # if port has TX-RX loopback
//!
//! cargo test --features hardware-tests --test integration_hardware -- --ignored
//! ```

use super::utils::{assert_duration_within, PortTestFixture, TimingHelper};
use serial_link::{EventHandler, MonitorState, ReadError};
use std::sync::mpsc;
use std::time::Duration;

fn fixture_or_skip() -> Option<PortTestFixture> {
    let fixture = PortTestFixture::setup();
    if fixture.is_none() {
        println!("Skipping hardware test: TEST_PORT not set or port unavailable");
    }
    fixture
}

#[test]
#[ignore]
fn test_real_port_open_close() {
    let Some(mut fixture) = fixture_or_skip() else {
        return;
    };

    assert!(fixture.handle.is_open());
    assert_eq!(fixture.handle.name(), fixture.port_name());

    fixture.handle.close().expect("close should succeed");
    assert!(!fixture.handle.is_open());
    assert!(fixture.handle.close().is_err());
}

#[test]
#[ignore]
fn test_real_port_reconfigure() {
    let Some(mut fixture) = fixture_or_skip() else {
        return;
    };

    let original = fixture.handle.baud_rate();
    fixture.handle.set_baud(19_200).expect("19200 baud");
    assert_eq!(fixture.handle.baud_rate(), 19_200);
    fixture.handle.set_baud(original).expect("restore baud");

    fixture
        .handle
        .set_timeouts(Duration::from_millis(200), Duration::from_millis(200))
        .expect("set timeouts");
    assert_eq!(fixture.handle.read_timeout(), Duration::from_millis(200));
}

#[test]
#[ignore]
fn test_real_port_read_timeout() {
    let Some(mut fixture) = fixture_or_skip() else {
        return;
    };
    if fixture.is_loopback() {
        println!("Skipping: a loopback line may echo stray bytes");
        return;
    }

    fixture
        .handle
        .set_timeouts(Duration::from_millis(200), Duration::from_millis(200))
        .expect("set timeouts");
    fixture.drain();

    let timer = TimingHelper::new("read_exact on idle line");
    let result = fixture.handle.read_exact(64);
    let elapsed = timer.finish();

    assert!(matches!(result, Err(ReadError::SizeMismatch { .. })));
    assert_duration_within(
        elapsed,
        Duration::from_millis(200),
        Duration::from_millis(150),
        "read should block for the read timeout",
    );
}

#[test]
#[ignore]
fn test_real_port_loopback_round_trip() {
    let Some(mut fixture) = fixture_or_skip() else {
        return;
    };
    if !fixture.is_loopback() {
        println!("Skipping loopback test: TEST_LOOPBACK not set to 1");
        return;
    }
    fixture.drain();

    let test_data = b"LOOPBACK TEST\r\n";
    fixture.handle.write_exact(test_data).expect("write");

    let echoed = fixture.handle.read_exact(test_data.len()).expect("read back");
    assert_eq!(echoed, test_data);
}

#[test]
#[ignore]
fn test_real_port_event_mode_loopback() {
    struct Forward(mpsc::Sender<Vec<u8>>);

    impl EventHandler for Forward {
        fn on_data(&mut self, data: &[u8]) {
            let _ = self.0.send(data.to_vec());
        }
    }

    let Some(mut fixture) = fixture_or_skip() else {
        return;
    };
    if !fixture.is_loopback() {
        println!("Skipping loopback test: TEST_LOOPBACK not set to 1");
        return;
    }
    fixture.drain();

    let (tx, rx) = mpsc::channel();
    fixture.handle.enable_event(Forward(tx)).expect("enable event");

    let test_data = b"EVENT MODE\r\n";
    fixture.handle.write_exact(test_data).expect("write");

    let mut received = Vec::new();
    while received.len() < test_data.len() {
        match rx.recv_timeout(Duration::from_secs(2)) {
            Ok(chunk) => received.extend(chunk),
            Err(_) => break,
        }
    }
    assert_eq!(received, test_data);

    fixture.handle.close().expect("close");
    assert_eq!(fixture.handle.event_state(), MonitorState::Stopped);
}
