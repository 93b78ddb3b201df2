//! Mock serial device for testing.
//!
//! `MockDevice` simulates a serial line in memory. Reads block on a condition
//! variable until bytes arrive or the timeout elapses, just like a real driver,
//! so timing behaviour of the layers above can be tested without hardware.
//! `MockBus` is a named registry of mock devices that acts as a
//! [`DeviceOpener`] with exclusive claims.

use super::error::PortError;
use super::traits::{DeviceOpener, SerialDevice};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Device operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// `read_bytes`
    Read,
    /// `write_bytes`
    Write,
    /// `bytes_to_read`
    Probe,
    /// `wait_for_data`
    Wait,
    /// `baud_rate` read-back
    ReadConfig,
    /// `set_baud_rate` and `set_timeout`
    ApplyConfig,
    /// `try_clone`
    Clone,
    /// `close`
    Close,
}

/// Injected faults that never run out.
const PERSISTENT: u32 = u32::MAX;

/// One direction of a simulated serial line.
#[derive(Debug, Default)]
struct Line {
    queue: Mutex<VecDeque<u8>>,
    ready: Condvar,
}

impl Line {
    fn push(&self, data: &[u8]) {
        let mut queue = self.queue.lock();
        queue.extend(data);
        self.ready.notify_all();
    }

    fn len(&self) -> usize {
        self.queue.lock().len()
    }

    fn clear(&self) {
        self.queue.lock().clear();
    }

    /// Block until the queue is non-empty or `timeout` elapses.
    fn wait_readable(&self, timeout: Duration) -> bool {
        let mut queue = self.queue.lock();
        match Instant::now().checked_add(timeout) {
            Some(deadline) => {
                while queue.is_empty() {
                    if self.ready.wait_until(&mut queue, deadline).timed_out() {
                        break;
                    }
                }
            }
            None => {
                while queue.is_empty() {
                    self.ready.wait(&mut queue);
                }
            }
        }
        !queue.is_empty()
    }

    /// Move up to `buffer.len()` queued bytes into `buffer`, waiting for the
    /// first one at most `timeout`.
    fn take(&self, buffer: &mut [u8], timeout: Duration) -> usize {
        if buffer.is_empty() || !self.wait_readable(timeout) {
            return 0;
        }
        let mut queue = self.queue.lock();
        let n = buffer.len().min(queue.len());
        for (slot, byte) in buffer.iter_mut().zip(queue.drain(..n)) {
            *slot = byte;
        }
        n
    }
}

/// Device-level state shared by every clone of a mock device.
#[derive(Debug)]
struct MockControl {
    baud_rate: u32,
    /// Log of every accepted write.
    write_log: Vec<Vec<u8>>,
    /// Bytes the transmitter still accepts; `None` is unlimited.
    write_budget: Option<usize>,
    /// Remaining failures per operation.
    faults: HashMap<Fault, u32>,
    /// Most recent timeout accepted by any clone.
    last_timeout: Option<Duration>,
    claimed: bool,
    closed: bool,
}

impl Default for MockControl {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            write_log: Vec::new(),
            write_budget: None,
            faults: HashMap::new(),
            last_timeout: None,
            claimed: false,
            closed: false,
        }
    }
}

impl MockControl {
    fn ensure_open(&self) -> Result<(), PortError> {
        if self.closed {
            Err(PortError::NotOpen)
        } else {
            Ok(())
        }
    }

    fn trip(&mut self, fault: Fault) -> Result<(), PortError> {
        match self.faults.get_mut(&fault) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != PERSISTENT {
                    *remaining -= 1;
                }
                Err(PortError::io(format!("injected {fault:?} fault")))
            }
            _ => Ok(()),
        }
    }
}

/// Mock serial device implementation for testing.
///
/// This implementation allows you to:
/// - Inject bytes as if they arrived on the wire
/// - Wire two devices together, or loop a device's TX back to its RX
/// - Inspect what data was written
/// - Limit how many bytes the transmitter accepts
/// - Make individual operations fail
///
/// # Example
/// ```
/// use serial_link::port::{MockDevice, SerialDevice};
/// use std::time::Duration;
///
/// let mut port = MockDevice::new("MOCK0");
/// port.set_timeout(Duration::from_millis(10)).unwrap();
///
/// // Bytes "arrive" on the line
/// port.enqueue_read(b"Hello, World!");
///
/// let mut buffer = [0u8; 13];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Hello, World!");
///
/// port.write_bytes(b"Response").unwrap();
/// assert_eq!(port.get_write_log(), vec![b"Response".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockDevice {
    /// The port name/identifier.
    name: String,
    /// Bytes waiting to be read.
    rx: Arc<Line>,
    /// Where written bytes go, besides the write log.
    tx: Option<Arc<Line>>,
    control: Arc<Mutex<MockControl>>,
    /// Per-handle I/O timeout.
    timeout: Duration,
}

impl MockDevice {
    /// Create a standalone mock device. Written bytes are only logged.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rx: Arc::new(Line::default()),
            tx: None,
            control: Arc::new(Mutex::new(MockControl::default())),
            timeout: Duration::from_secs(1),
        }
    }

    /// Create a device whose TX is jumpered to its own RX.
    pub fn loopback(name: impl Into<String>) -> Self {
        let mut device = Self::new(name);
        device.tx = Some(Arc::clone(&device.rx));
        device
    }

    /// Create two devices wired to each other (TX of one feeds RX of the other).
    pub fn pair(first: impl Into<String>, second: impl Into<String>) -> (Self, Self) {
        let mut a = Self::new(first);
        let mut b = Self::new(second);
        a.tx = Some(Arc::clone(&b.rx));
        b.tx = Some(Arc::clone(&a.rx));
        (a, b)
    }

    /// Get the port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make bytes available to subsequent reads, waking blocked readers.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.rx.push(data);
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.rx.len()
    }

    /// Discard every byte waiting to be read.
    pub fn clear_input(&self) {
        self.rx.clear();
    }

    /// Make `fault` fail every time until cleared.
    pub fn inject_fault(&self, fault: Fault) {
        self.control.lock().faults.insert(fault, PERSISTENT);
    }

    /// Make `fault` fail for the next `count` calls.
    pub fn inject_faults(&self, fault: Fault, count: u32) {
        self.control.lock().faults.insert(fault, count);
    }

    /// Stop failing `fault`.
    pub fn clear_fault(&self, fault: Fault) {
        self.control.lock().faults.remove(&fault);
    }

    /// Limit the total number of bytes the transmitter will still accept.
    ///
    /// Once exhausted, writes stall for the handle's timeout and accept nothing.
    pub fn set_write_budget(&self, budget: Option<usize>) {
        self.control.lock().write_budget = budget;
    }

    /// Get a copy of every accepted write, in order.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.control.lock().write_log.clone()
    }

    /// All accepted bytes concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.control.lock().write_log.concat()
    }

    /// Clear the write log.
    pub fn clear_write_log(&self) {
        self.control.lock().write_log.clear();
    }

    /// Baud rate currently applied to the simulated device.
    pub fn current_baud_rate(&self) -> u32 {
        self.control.lock().baud_rate
    }

    /// Timeout configured on this handle.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Most recent timeout applied through any clone of this device.
    pub fn last_applied_timeout(&self) -> Option<Duration> {
        self.control.lock().last_timeout
    }

    /// Number of live clones of this device, this one included.
    pub fn live_clones(&self) -> usize {
        Arc::strong_count(&self.control)
    }

    /// Whether an opener currently holds this device.
    pub fn is_claimed(&self) -> bool {
        self.control.lock().claimed
    }

    /// Whether the device has been closed.
    pub fn is_closed(&self) -> bool {
        self.control.lock().closed
    }

    /// Take exclusive ownership, as an exclusive OS open would.
    fn claim(&self, baud_rate: u32) -> Result<(), PortError> {
        let mut control = self.control.lock();
        if control.claimed {
            return Err(PortError::in_use(self.name.clone()));
        }
        control.claimed = true;
        control.closed = false;
        control.baud_rate = baud_rate;
        Ok(())
    }
}

impl SerialDevice for MockDevice {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        {
            let mut control = self.control.lock();
            control.ensure_open()?;
            control.trip(Fault::Read)?;
        }
        Ok(self.rx.take(buffer, self.timeout))
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let accepted = {
            let mut control = self.control.lock();
            control.ensure_open()?;
            control.trip(Fault::Write)?;

            let accepted = control
                .write_budget
                .map_or(data.len(), |budget| budget.min(data.len()));
            if let Some(budget) = control.write_budget.as_mut() {
                *budget -= accepted;
            }
            if accepted > 0 {
                control.write_log.push(data[..accepted].to_vec());
            }
            accepted
        };

        if accepted == 0 && !data.is_empty() {
            // Transmitter is stalled: block for the full timeout like a real driver.
            thread::sleep(self.timeout);
            return Ok(0);
        }
        if let Some(tx) = &self.tx {
            tx.push(&data[..accepted]);
        }
        Ok(accepted)
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        {
            let mut control = self.control.lock();
            control.ensure_open()?;
            control.trip(Fault::ApplyConfig)?;
            control.last_timeout = Some(timeout);
        }
        self.timeout = timeout;
        Ok(())
    }

    fn baud_rate(&self) -> Result<u32, PortError> {
        let mut control = self.control.lock();
        control.ensure_open()?;
        control.trip(Fault::ReadConfig)?;
        Ok(control.baud_rate)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), PortError> {
        let mut control = self.control.lock();
        control.ensure_open()?;
        control.trip(Fault::ApplyConfig)?;
        control.baud_rate = baud_rate;
        Ok(())
    }

    fn bytes_to_read(&self) -> Result<usize, PortError> {
        {
            let mut control = self.control.lock();
            control.ensure_open()?;
            control.trip(Fault::Probe)?;
        }
        Ok(self.rx.len())
    }

    fn wait_for_data(&mut self, timeout: Duration) -> Result<bool, PortError> {
        {
            let mut control = self.control.lock();
            control.ensure_open()?;
            control.trip(Fault::Wait)?;
        }
        Ok(self.rx.wait_readable(timeout))
    }

    fn try_clone(&self) -> Result<Box<dyn SerialDevice>, PortError> {
        {
            let mut control = self.control.lock();
            control.ensure_open()?;
            control.trip(Fault::Clone)?;
        }
        Ok(Box::new(self.clone()))
    }

    fn close(&mut self) -> Result<(), PortError> {
        let mut control = self.control.lock();
        control.ensure_open()?;
        control.trip(Fault::Close)?;
        control.closed = true;
        control.claimed = false;
        Ok(())
    }
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDevice")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A set of named mock devices that can be opened like real ports.
///
/// Opening claims the device exclusively until it is closed.
///
/// # Example
/// ```
/// use serial_link::port::{DeviceOpener, MockBus, MockDevice};
/// use std::time::Duration;
///
/// let bus = MockBus::new();
/// bus.insert(MockDevice::new("COM7"));
///
/// let first = bus.open_device("COM7", 115_200, Duration::from_millis(50));
/// assert!(first.is_ok());
/// assert!(bus.open_device("COM7", 115_200, Duration::from_millis(50)).is_err());
/// assert!(bus.open_device("COM8", 115_200, Duration::from_millis(50)).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockBus {
    devices: Arc<Mutex<HashMap<String, MockDevice>>>,
}

impl MockBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device under its name, returning a handle to it for the test.
    pub fn insert(&self, device: MockDevice) -> MockDevice {
        self.devices
            .lock()
            .insert(device.name().to_string(), device.clone());
        device
    }

    /// Look up a registered device.
    pub fn get(&self, name: &str) -> Option<MockDevice> {
        self.devices.lock().get(name).cloned()
    }
}

impl DeviceOpener for MockBus {
    fn open_device(
        &self,
        port_name: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialDevice>, PortError> {
        let mut device = self
            .get(port_name)
            .ok_or_else(|| PortError::not_found(port_name))?;
        device.claim(baud_rate)?;
        device.timeout = timeout;
        Ok(Box::new(device))
    }
}
