//! Core traits for the serial device abstraction.
//!
//! [`SerialDevice`] is the set of OS primitives the port handle is built on,
//! and [`DeviceOpener`] acquires one by name. Real hardware and the in-memory
//! mock implement both, so every layer above can be exercised without a
//! physical port.

use super::error::PortError;
use std::time::Duration;

/// Primitive operations on an open serial device.
///
/// Reads and writes block for at most the timeout last passed to
/// [`set_timeout`](SerialDevice::set_timeout) and return `Ok(0)` when it
/// elapses without any transfer. Implementations must not busy-poll while
/// blocked.
pub trait SerialDevice: Send + std::fmt::Debug {
    /// Read up to `buffer.len()` bytes.
    ///
    /// Returns as soon as at least one byte is available, or `Ok(0)` on
    /// timeout.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Write up to `data.len()` bytes, returning how many were accepted.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Set the timeout applied to subsequent reads and writes.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Read back the baud rate currently applied to the device.
    fn baud_rate(&self) -> Result<u32, PortError>;

    /// Apply a new baud rate, leaving the rest of the line settings intact.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), PortError>;

    /// Number of received bytes buffered by the driver. Never consumes data.
    fn bytes_to_read(&self) -> Result<usize, PortError>;

    /// Park the calling thread until data is buffered or `timeout` elapses.
    ///
    /// Returns `Ok(true)` if at least one byte can be read without blocking.
    fn wait_for_data(&mut self, timeout: Duration) -> Result<bool, PortError>;

    /// Open a second handle onto the same underlying device.
    ///
    /// The clone shares the OS resource but has its own timeout state.
    fn try_clone(&self) -> Result<Box<dyn SerialDevice>, PortError>;

    /// Release the device. Further calls on this handle may fail.
    fn close(&mut self) -> Result<(), PortError>;
}

/// Acquires exclusive access to a named serial device.
pub trait DeviceOpener {
    /// Open `port_name` at `baud_rate` with an initial I/O timeout.
    fn open_device(
        &self,
        port_name: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialDevice>, PortError>;
}

impl<F> DeviceOpener for F
where
    F: Fn(&str, u32, Duration) -> Result<Box<dyn SerialDevice>, PortError>,
{
    fn open_device(
        &self,
        port_name: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialDevice>, PortError> {
        self(port_name, baud_rate, timeout)
    }
}
