//! Device abstraction layer for serial communication.
//!
//! Provides the [`SerialDevice`] and [`DeviceOpener`] traits plus the
//! OS-backed and in-memory implementations, enabling dependency injection and
//! testing via mocks.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::{Fault, MockBus, MockDevice};
pub use sync_port::*;
pub use traits::*;
