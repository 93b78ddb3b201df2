//! The port handle: one open serial device plus its configuration.
//!
//! A [`PortHandle`] is created already open and configured. Blocking reads
//! and writes go straight through the device; registering an
//! [`EventHandler`] hands the receive side to a background
//! [monitor](crate::monitor) instead.

use crate::error::{
    CloseError, ConfigError, EventError, OpenError, ProbeError, ReadError, WriteError,
};
use crate::monitor::{EventHandler, EventMonitor, MonitorState, MIN_POLL_INTERVAL};
use crate::port::{DeviceOpener, PortError, SerialDevice, SystemOpener};
use crate::settings::{MonitorSettings, SerialSettings, SettingsResult};
use crate::transport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// An open (or closed) serial port.
///
/// Recorded configuration always matches what was last applied to the device
/// successfully. Dropping the handle closes it.
///
/// # Example
/// ```
/// use serial_link::port::{MockBus, MockDevice};
/// use serial_link::PortHandle;
/// use std::time::Duration;
///
/// let bus = MockBus::new();
/// let device = bus.insert(MockDevice::loopback("COM3"));
///
/// let timeout = Duration::from_millis(50);
/// let mut port = PortHandle::open_with(&bus, "COM3", 9600, timeout, timeout).unwrap();
/// port.write_exact(b"ping").unwrap();
/// assert_eq!(port.read_exact(4).unwrap(), b"ping");
///
/// port.close().unwrap();
/// assert!(!device.is_claimed());
/// ```
#[derive(Debug)]
pub struct PortHandle {
    device: Option<Box<dyn SerialDevice>>,
    name: String,
    baud_rate: u32,
    read_timeout: Duration,
    write_timeout: Duration,
    /// Read timeout as seen by the monitor thread.
    read_timeout_ms: Arc<AtomicU64>,
    monitor_settings: MonitorSettings,
    monitor: Option<EventMonitor>,
}

impl PortHandle {
    /// Open a system serial port.
    pub fn open(
        name: &str,
        baud_rate: u32,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, OpenError> {
        Self::open_with(&SystemOpener, name, baud_rate, read_timeout, write_timeout)
    }

    /// Open a port through `opener`.
    ///
    /// The device is claimed exclusively, then the baud rate and timeouts are
    /// applied. If either step fails the device is released again and no
    /// handle is returned.
    pub fn open_with(
        opener: &dyn DeviceOpener,
        name: &str,
        baud_rate: u32,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, OpenError> {
        if baud_rate == 0 {
            return Err(OpenError::Configuration {
                name: name.to_string(),
                source: ConfigError::InvalidBaudRate(baud_rate),
            });
        }

        let device = opener
            .open_device(name, baud_rate, read_timeout)
            .map_err(|source| OpenError::DeviceUnavailable {
                name: name.to_string(),
                source,
            })?;

        let mut handle = Self {
            device: Some(device),
            name: name.to_string(),
            baud_rate,
            read_timeout,
            write_timeout,
            read_timeout_ms: Arc::new(AtomicU64::new(duration_ms(read_timeout))),
            monitor_settings: MonitorSettings::default(),
            monitor: None,
        };

        let configured = handle
            .set_baud(baud_rate)
            .and_then(|()| handle.set_timeouts(read_timeout, write_timeout));
        if let Err(source) = configured {
            if let Some(mut device) = handle.device.take() {
                if let Err(err) = device.close() {
                    warn!(port = %name, error = %err, "failed to release device after configuration error");
                }
            }
            return Err(OpenError::Configuration {
                name: name.to_string(),
                source,
            });
        }

        info!(
            port = %name,
            baud_rate,
            read_timeout_ms = duration_ms(read_timeout),
            write_timeout_ms = duration_ms(write_timeout),
            "port opened"
        );
        Ok(handle)
    }

    /// Open the port named by `port` (or by `settings.port`) using the
    /// settings' baud rate and timeouts. Aliases are resolved first.
    pub fn from_settings(
        opener: &dyn DeviceOpener,
        settings: &SerialSettings,
        port: Option<&str>,
    ) -> Result<Self, OpenError> {
        let requested = port
            .or(settings.port.as_deref())
            .ok_or(OpenError::NoPortSpecified)?;
        let name = settings.resolve_port(requested);
        if name != requested {
            debug!(alias = %requested, port = %name, "resolved port alias");
        }

        Self::open_with(
            opener,
            &name,
            settings.baud_rate,
            settings.read_timeout(),
            settings.write_timeout(),
        )
    }

    /// Stop the event monitor (if any) and release the device.
    ///
    /// The monitor's clone of the device is dropped first, then the device
    /// itself is closed. Closing an already closed handle fails. If the
    /// release itself fails the handle stays open.
    pub fn close(&mut self) -> Result<(), CloseError> {
        if self.device.is_none() {
            return Err(CloseError::Unknown(PortError::NotOpen));
        }

        if let Some(monitor) = self.monitor.as_mut() {
            monitor.stop();
        }

        if let Some(device) = self.device.as_mut() {
            device.close().map_err(CloseError::Unknown)?;
        }
        self.device = None;
        info!(port = %self.name, "port closed");
        Ok(())
    }

    /// Change the baud rate.
    ///
    /// The current setting is read back first so the rest of the line
    /// configuration is preserved.
    pub fn set_baud(&mut self, baud_rate: u32) -> Result<(), ConfigError> {
        if baud_rate == 0 {
            return Err(ConfigError::InvalidBaudRate(baud_rate));
        }
        let device = self.device.as_mut().ok_or(ConfigError::NotOpen)?;

        let current = device.baud_rate().map_err(ConfigError::Unknown)?;
        device
            .set_baud_rate(baud_rate)
            .map_err(ConfigError::Unknown)?;

        debug!(port = %self.name, from = current, to = baud_rate, "baud rate applied");
        self.baud_rate = baud_rate;
        Ok(())
    }

    /// Set the overall timeouts of one exact-size read and write.
    ///
    /// There is no inter-byte timeout. A running monitor picks up the new
    /// read timeout on its next cycle.
    pub fn set_timeouts(
        &mut self,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<(), ConfigError> {
        let device = self.device.as_mut().ok_or(ConfigError::NotOpen)?;
        device
            .set_timeout(read_timeout)
            .map_err(ConfigError::Unknown)?;

        self.read_timeout = read_timeout;
        self.write_timeout = write_timeout;
        self.read_timeout_ms
            .store(duration_ms(read_timeout), Ordering::Relaxed);
        debug!(
            port = %self.name,
            read_timeout_ms = duration_ms(read_timeout),
            write_timeout_ms = duration_ms(write_timeout),
            "timeouts applied"
        );
        Ok(())
    }

    /// Read exactly `size` bytes within the read timeout.
    ///
    /// On timeout the bytes that did arrive are returned inside
    /// [`ReadError::SizeMismatch`]. Rejected while an event handler owns the
    /// receive side.
    pub fn read_exact(&mut self, size: usize) -> Result<Vec<u8>, ReadError> {
        if self.event_mode_active() {
            return Err(ReadError::EventModeActive);
        }
        let device = self.device.as_mut().ok_or(ReadError::NotOpen)?;
        if size == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; size];
        let read = transport::read_exact_into(&mut **device, &mut buffer, self.read_timeout)
            .map_err(ReadError::Unknown)?;
        buffer.truncate(read);

        if read < size {
            debug!(port = %self.name, requested = size, read, "read timed out");
            return Err(ReadError::SizeMismatch {
                requested: size,
                partial: buffer,
            });
        }
        Ok(buffer)
    }

    /// Write all of `data` within the write timeout.
    pub fn write_exact(&mut self, data: &[u8]) -> Result<(), WriteError> {
        let device = self.device.as_mut().ok_or(WriteError::NotOpen)?;
        if data.is_empty() {
            return Ok(());
        }

        let written = transport::write_exact_from(&mut **device, data, self.write_timeout)
            .map_err(WriteError::Unknown)?;
        if written < data.len() {
            debug!(port = %self.name, requested = data.len(), written, "write timed out");
            return Err(WriteError::SizeMismatch {
                requested: data.len(),
                written,
            });
        }
        Ok(())
    }

    /// Number of received bytes waiting in the driver. Never blocks or
    /// consumes data.
    pub fn bytes_available(&self) -> Result<usize, ProbeError> {
        let device = self.device.as_ref().ok_or(ProbeError::NotOpen)?;
        device.bytes_to_read().map_err(ProbeError::Unknown)
    }

    /// Block until at least one byte is buffered.
    ///
    /// Waits in slices of the monitor poll interval; always returns
    /// `Ok(true)` unless the device fails.
    pub fn wait_for_data(&mut self) -> Result<bool, ProbeError> {
        let slice = self.monitor_settings.poll_interval().max(MIN_POLL_INTERVAL);
        let device = self.device.as_mut().ok_or(ProbeError::NotOpen)?;
        loop {
            if device.wait_for_data(slice).map_err(ProbeError::Unknown)? {
                return Ok(true);
            }
        }
    }

    /// Block until data is buffered or `timeout` elapses.
    pub fn wait_for_data_timeout(&mut self, timeout: Duration) -> Result<bool, ProbeError> {
        let device = self.device.as_mut().ok_or(ProbeError::NotOpen)?;
        device.wait_for_data(timeout).map_err(ProbeError::Unknown)
    }

    /// Register `handler` and start the event monitor.
    pub fn enable_event<H: EventHandler>(&mut self, handler: H) -> Result<(), EventError> {
        self.register_handler(Some(Box::new(handler)))
    }

    /// Register a boxed handler and start the event monitor.
    ///
    /// Only one handler can ever be registered on a handle; there is no way
    /// to replace or remove it.
    pub fn register_handler(
        &mut self,
        handler: Option<Box<dyn EventHandler>>,
    ) -> Result<(), EventError> {
        let handler = handler.ok_or(EventError::NullHandler)?;
        if self.monitor.is_some() {
            return Err(EventError::AlreadyRegistered);
        }
        let device = self.device.as_ref().ok_or(EventError::NotOpen)?;

        let shared = device.try_clone().map_err(EventError::Device)?;
        let monitor = EventMonitor::spawn(
            &self.name,
            shared,
            handler,
            &self.monitor_settings,
            Arc::clone(&self.read_timeout_ms),
        )
        .map_err(EventError::Spawn)?;

        self.monitor = Some(monitor);
        Ok(())
    }

    /// Device name the handle was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the device is still held.
    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Last baud rate applied successfully.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Overall timeout of one [`read_exact`](Self::read_exact).
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Overall timeout of one [`write_exact`](Self::write_exact).
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// State of the event monitor; `Idle` if no handler was registered.
    pub fn event_state(&self) -> MonitorState {
        self.monitor
            .as_ref()
            .map_or(MonitorState::Idle, EventMonitor::state)
    }

    /// Tuning used when the monitor is spawned.
    pub fn monitor_settings(&self) -> &MonitorSettings {
        &self.monitor_settings
    }

    /// Replace the monitor tuning. Has no effect on a monitor already running.
    ///
    /// Invalid settings are rejected and the previous ones kept.
    pub fn set_monitor_settings(&mut self, settings: MonitorSettings) -> SettingsResult<()> {
        settings.validate()?;
        self.monitor_settings = settings;
        Ok(())
    }

    fn event_mode_active(&self) -> bool {
        self.monitor
            .as_ref()
            .is_some_and(|monitor| monitor.state() != MonitorState::Stopped)
    }
}

impl Drop for PortHandle {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(err) = self.close() {
                warn!(port = %self.name, error = %err, "failed to close port on drop");
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
