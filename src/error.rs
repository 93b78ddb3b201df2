//! Operation-level errors returned by [`PortHandle`](crate::PortHandle).
//!
//! Each public operation has its own error type so callers can match on
//! exactly the outcomes that operation can produce. None of them is fatal to
//! the process and no operation retries on its own. Device failures are kept
//! as the `#[source]` of the `Unknown` variants.

use crate::port::PortError;
use thiserror::Error;

/// Failure to acquire and configure a device.
#[derive(Debug, Error)]
pub enum OpenError {
    /// The device cannot be exclusively claimed (missing, in use, denied).
    #[error("serial device '{name}' is unavailable: {source}")]
    DeviceUnavailable {
        name: String,
        #[source]
        source: PortError,
    },

    /// The device was acquired but rejected its initial configuration.
    /// It has been released again.
    #[error("serial device '{name}' rejected its initial configuration: {source}")]
    Configuration {
        name: String,
        #[source]
        source: ConfigError,
    },

    /// Neither the caller nor the settings named a port.
    #[error("no serial port specified")]
    NoPortSpecified,
}

/// Failure to release a device.
#[derive(Debug, Error)]
pub enum CloseError {
    /// The release failed, or the handle was already closed.
    #[error("failed to release serial device: {0}")]
    Unknown(#[source] PortError),
}

/// Failure to change baud rate or timeouts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading back or applying the device configuration failed.
    #[error("failed to apply device configuration: {0}")]
    Unknown(#[source] PortError),

    /// Baud rates must be positive.
    #[error("invalid baud rate: {0}")]
    InvalidBaudRate(u32),

    /// The handle has been closed.
    #[error("port is not open")]
    NotOpen,
}

/// Failure of [`read_exact`](crate::PortHandle::read_exact).
#[derive(Debug, Error)]
pub enum ReadError {
    /// The read call itself failed.
    #[error("read failed: {0}")]
    Unknown(#[source] PortError),

    /// The timeout elapsed before `requested` bytes arrived. `partial` holds
    /// everything that did arrive, in order.
    #[error("read timed out after {} of {requested} bytes", .partial.len())]
    SizeMismatch { requested: usize, partial: Vec<u8> },

    /// The handle has been closed.
    #[error("port is not open")]
    NotOpen,

    /// An event handler owns the receive side of this handle.
    #[error("port is in event mode; received data goes to the registered handler")]
    EventModeActive,
}

impl ReadError {
    /// Number of bytes collected before a size mismatch.
    pub fn partial_count(&self) -> Option<usize> {
        match self {
            Self::SizeMismatch { partial, .. } => Some(partial.len()),
            _ => None,
        }
    }
}

/// Failure of [`write_exact`](crate::PortHandle::write_exact).
#[derive(Debug, Error)]
pub enum WriteError {
    /// The write call itself failed.
    #[error("write failed: {0}")]
    Unknown(#[source] PortError),

    /// The timeout elapsed after only `written` of `requested` bytes were
    /// accepted.
    #[error("write timed out after {written} of {requested} bytes")]
    SizeMismatch { requested: usize, written: usize },

    /// The handle has been closed.
    #[error("port is not open")]
    NotOpen,
}

impl WriteError {
    /// Number of bytes accepted before a size mismatch.
    pub fn partial_count(&self) -> Option<usize> {
        match self {
            Self::SizeMismatch { written, .. } => Some(*written),
            _ => None,
        }
    }
}

/// Failure of the availability probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The driver query or wait failed.
    #[error("availability probe failed: {0}")]
    Unknown(#[source] PortError),

    /// The handle has been closed.
    #[error("port is not open")]
    NotOpen,
}

/// Failure to register an event handler.
#[derive(Debug, Error)]
pub enum EventError {
    /// No handler was supplied.
    #[error("no event handler supplied")]
    NullHandler,

    /// A handler was already registered on this handle.
    #[error("an event handler is already registered")]
    AlreadyRegistered,

    /// The handle has been closed.
    #[error("port is not open")]
    NotOpen,

    /// The monitor's device handle could not be created.
    #[error("failed to share the device with the event monitor: {0}")]
    Device(#[source] PortError),

    /// The monitor thread could not be started.
    #[error("failed to spawn event monitor: {0}")]
    Spawn(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mismatch_display_and_count() {
        let err = ReadError::SizeMismatch {
            requested: 5,
            partial: b"abc".to_vec(),
        };
        assert_eq!(err.to_string(), "read timed out after 3 of 5 bytes");
        assert_eq!(err.partial_count(), Some(3));
        assert_eq!(ReadError::NotOpen.partial_count(), None);

        let err = WriteError::SizeMismatch {
            requested: 8,
            written: 2,
        };
        assert_eq!(err.to_string(), "write timed out after 2 of 8 bytes");
        assert_eq!(err.partial_count(), Some(2));
    }

    #[test]
    fn test_open_error_keeps_source() {
        use std::error::Error as _;

        let err = OpenError::DeviceUnavailable {
            name: "COM7".to_string(),
            source: PortError::not_found("COM7"),
        };
        assert!(err.to_string().contains("COM7"));
        assert!(err.source().is_some());

        let err = OpenError::Configuration {
            name: "COM7".to_string(),
            source: ConfigError::InvalidBaudRate(0),
        };
        assert!(err.to_string().contains("invalid baud rate: 0"));
    }
}
