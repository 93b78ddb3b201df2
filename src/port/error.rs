//! Device-level error types.
//!
//! `PortError` describes what went wrong underneath a serial device: the OS
//! call, the `serialport` crate, or the mock backend. Operation-level errors in
//! [`crate::error`] wrap it as their source.

use thiserror::Error;

/// Errors raised by a [`SerialDevice`](super::SerialDevice) or a
/// [`DeviceOpener`](super::DeviceOpener).
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial device was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// The device is exclusively held by another handle.
    #[error("Serial port is already in use: {0}")]
    InUse(String),

    /// An I/O error occurred during device operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device rejected a configuration change.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The device has been released.
    #[error("Port is not open")]
    NotOpen,

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create an InUse error from a port name.
    pub fn in_use(port_name: impl Into<String>) -> Self {
        Self::InUse(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an Io error of kind `Other` from a message.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(std::io::Error::other(message.into()))
    }

    /// Map a `serialport` open failure for `port_name`.
    pub(crate) fn from_open(port_name: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => Self::not_found(port_name),
            serialport::ErrorKind::InvalidInput => Self::config(err.to_string()),
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => Self::not_found(port_name),
            _ => Self::Serial(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "Serial port not found: /dev/ttyUSB0");

        let err = PortError::config("Invalid baud rate");
        assert_eq!(err.to_string(), "Configuration error: Invalid baud rate");

        let err = PortError::in_use("COM7");
        assert_eq!(err.to_string(), "Serial port is already in use: COM7");

        assert_eq!(PortError::NotOpen.to_string(), "Port is not open");
    }

    #[test]
    fn test_open_error_mapping() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert!(matches!(
            PortError::from_open("/dev/ttyS9", err),
            PortError::NotFound(name) if name == "/dev/ttyS9"
        ));

        let err = serialport::Error::new(serialport::ErrorKind::InvalidInput, "bad baud");
        assert!(matches!(PortError::from_open("COM1", err), PortError::Config(_)));

        let err = serialport::Error::new(serialport::ErrorKind::Unknown, "???");
        assert!(matches!(PortError::from_open("COM1", err), PortError::Serial(_)));
    }
}
