//! Shared test utilities for serial_link integration tests.
//!
//! This module provides common test infrastructure including:
//! - Mock bus and port handle setup
//! - A recording event handler
//! - Polling helpers for asynchronous assertions

#![allow(dead_code)]

use parking_lot::Mutex;
use serial_link::port::{MockBus, MockDevice};
use serial_link::{EventHandler, MonitorError, MonitorSettings, PortHandle};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default read/write timeout for mock handles.
pub const TIMEOUT: Duration = Duration::from_millis(100);

/// Default baud rate for mock handles.
pub const BAUD: u32 = 115_200;

/// A mock bus with one registered device, opened as a handle.
pub struct MockFixture {
    pub bus: MockBus,
    pub device: MockDevice,
    pub handle: PortHandle,
}

impl MockFixture {
    /// Register `device` on a fresh bus and open it.
    pub fn with_device(device: MockDevice) -> Self {
        let bus = MockBus::new();
        let name = device.name().to_string();
        let device = bus.insert(device);
        let mut handle = PortHandle::open_with(&bus, &name, BAUD, TIMEOUT, TIMEOUT)
            .expect("mock device should open");
        handle
            .set_monitor_settings(fast_monitor())
            .expect("valid monitor settings");
        Self {
            bus,
            device,
            handle,
        }
    }

    /// A standalone device the test feeds with `enqueue_read`.
    pub fn new(name: &str) -> Self {
        Self::with_device(MockDevice::new(name))
    }

    /// A device whose writes come back as reads.
    pub fn loopback(name: &str) -> Self {
        Self::with_device(MockDevice::loopback(name))
    }
}

/// Open both ends of a wired mock pair.
pub fn open_pair(a: &str, b: &str) -> (PortHandle, PortHandle) {
    let bus = MockBus::new();
    let (first, second) = MockDevice::pair(a, b);
    bus.insert(first);
    bus.insert(second);

    let first = PortHandle::open_with(&bus, a, BAUD, TIMEOUT, TIMEOUT).expect("open first end");
    let second = PortHandle::open_with(&bus, b, BAUD, TIMEOUT, TIMEOUT).expect("open second end");
    (first, second)
}

/// Monitor tuning that keeps test latency low.
pub fn fast_monitor() -> MonitorSettings {
    MonitorSettings {
        poll_interval_ms: 5,
        buffer_capacity: 4096,
        max_consecutive_failures: 3,
    }
}

/// Event handler that records every delivery for later inspection.
#[derive(Clone, Default)]
pub struct Collector {
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    terminated: Arc<Mutex<Option<String>>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each `on_data` call, in order.
    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.chunks.lock().clone()
    }

    /// All delivered bytes concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.chunks.lock().concat()
    }

    /// The termination reason, if the monitor gave up.
    pub fn terminated(&self) -> Option<String> {
        self.terminated.lock().clone()
    }
}

impl EventHandler for Collector {
    fn on_data(&mut self, data: &[u8]) {
        self.chunks.lock().push(data.to_vec());
    }

    fn on_terminated(&mut self, error: &MonitorError) {
        *self.terminated.lock() = Some(error.to_string());
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_opens_handle() {
        let fixture = MockFixture::new("MOCK0");
        assert!(fixture.handle.is_open());
        assert!(fixture.device.is_claimed());
        assert_eq!(fixture.handle.monitor_settings(), &fast_monitor());
    }

    #[test]
    fn test_collector_records_in_order() {
        let mut collector = Collector::new();
        collector.on_data(b"ab");
        collector.on_data(b"c");
        assert_eq!(collector.chunks(), vec![b"ab".to_vec(), b"c".to_vec()]);
        assert_eq!(collector.bytes(), b"abc");
        assert!(collector.terminated().is_none());
    }

    #[test]
    fn test_wait_until_times_out() {
        let started = Instant::now();
        assert!(!wait_until(|| false));
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
