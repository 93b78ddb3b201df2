//! Serial Link Library
//!
//! A small serial-port library: open a device by name, configure baud rate
//! and timeouts, move exact-size blocks of bytes, probe the receive buffer,
//! and optionally hand received data to an event handler running on a
//! background monitor thread.
//!
//! # Modules
//!
//! - `handle`: the [`PortHandle`] and its operations
//! - `error`: per-operation error types
//! - `monitor`: event-driven receive monitor
//! - `port`: device abstraction layer (real hardware and in-memory mocks)
//! - `settings`: TOML settings with environment overrides
//! - `logging`: tracing subscriber setup
//!
//! # Example
//!
//! ```
//! use serial_link::port::{MockBus, MockDevice};
//! use serial_link::PortHandle;
//! use std::sync::mpsc;
//! use std::time::Duration;
//!
//! let bus = MockBus::new();
//! let device = bus.insert(MockDevice::new("COM4"));
//!
//! let timeout = Duration::from_millis(100);
//! let mut port = PortHandle::open_with(&bus, "COM4", 115_200, timeout, timeout)?;
//!
//! let (tx, rx) = mpsc::channel();
//! port.enable_event(move |data: &[u8]| {
//!     let _ = tx.send(data.to_vec());
//! })?;
//!
//! device.enqueue_read(b"ABC");
//! assert_eq!(rx.recv_timeout(Duration::from_secs(2))?, b"ABC");
//! port.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod handle;
pub mod logging;
pub mod monitor;
pub mod port;
pub mod settings;

mod transport;

// Re-export commonly used types for convenience
pub use error::{
    CloseError, ConfigError, EventError, OpenError, ProbeError, ReadError, WriteError,
};
pub use handle::PortHandle;
pub use monitor::{EventHandler, MonitorError, MonitorState};
pub use port::{DeviceOpener, MockBus, MockDevice, PortError, SerialDevice, SystemOpener};
pub use settings::{MonitorSettings, SerialSettings, Settings, SettingsError, SettingsLoader};
