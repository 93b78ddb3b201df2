//! Serial device backed by the operating system.
//!
//! Wraps the `serialport` crate's native port type with our own
//! [`SerialDevice`] trait. On Unix the port is opened exclusively (`TIOCEXCL`)
//! and data waits use `poll(2)` on the file descriptor; on other platforms the
//! OS share mode provides exclusivity and waits fall back to probing the
//! driver queue in short sleeps.

use super::error::PortError;
use super::traits::{DeviceOpener, SerialDevice};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::debug;

#[cfg(unix)]
pub type NativePort = serialport::TTYPort;

#[cfg(not(unix))]
pub type NativePort = Box<dyn serialport::SerialPort>;

/// Sleep between queue probes where no wait primitive is available.
#[cfg(not(unix))]
const PROBE_STEP: Duration = Duration::from_millis(2);

/// A serial device opened through the operating system.
///
/// [`close`](SerialDevice::close) drops the native port, which releases the
/// descriptor and the exclusive lock; every later call fails with
/// [`PortError::NotOpen`].
pub struct SystemDevice {
    /// The underlying serial port implementation, `None` once closed.
    port: Option<NativePort>,
    /// The port name/path for identification.
    name: String,
}

impl SystemDevice {
    /// Open a serial port exclusively, 8N1 without flow control.
    ///
    /// # Example
    /// ```no_run
    /// use serial_link::port::SystemDevice;
    /// use std::time::Duration;
    ///
    /// let device = SystemDevice::open("/dev/ttyUSB0", 115_200, Duration::from_secs(1))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self, PortError> {
        let builder = serialport::new(port_name, baud_rate).timeout(timeout);

        #[cfg(unix)]
        let port = builder.open_native();
        #[cfg(not(unix))]
        let port = builder.open();

        let port = port.map_err(|e| PortError::from_open(port_name, e))?;
        debug!(port = %port_name, baud_rate, "device acquired");

        Ok(Self {
            port: Some(port),
            name: port_name.to_string(),
        })
    }

    /// Get the port name this device was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a reference to the underlying serialport implementation, if the
    /// device is still open.
    ///
    /// This can be useful for accessing platform-specific features.
    pub fn as_raw(&self) -> Option<&NativePort> {
        self.port.as_ref()
    }

    fn port(&self) -> Result<&NativePort, PortError> {
        self.port.as_ref().ok_or(PortError::NotOpen)
    }

    fn port_mut(&mut self) -> Result<&mut NativePort, PortError> {
        self.port.as_mut().ok_or(PortError::NotOpen)
    }
}

impl SerialDevice for SystemDevice {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        match self.port_mut()?.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(PortError::Io(e)),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        match self.port_mut()?.write(data) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(PortError::Io(e)),
        }
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.port_mut()?.set_timeout(timeout).map_err(PortError::Serial)
    }

    fn baud_rate(&self) -> Result<u32, PortError> {
        self.port()?.baud_rate().map_err(PortError::Serial)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), PortError> {
        self.port_mut()?
            .set_baud_rate(baud_rate)
            .map_err(PortError::Serial)
    }

    fn bytes_to_read(&self) -> Result<usize, PortError> {
        self.port()?
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(PortError::Serial)
    }

    #[cfg(unix)]
    fn wait_for_data(&mut self, timeout: Duration) -> Result<bool, PortError> {
        use std::os::unix::io::AsRawFd;

        let mut fd = libc::pollfd {
            fd: self.port()?.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: `fd` is a single valid pollfd that outlives the call.
        let rc = unsafe { libc::poll(&mut fd, 1, millis) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(PortError::Io(err));
        }
        if rc == 0 {
            return Ok(false);
        }
        if fd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
            return Err(PortError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device reported hang-up or error while waiting",
            )));
        }
        Ok(fd.revents & libc::POLLIN != 0)
    }

    #[cfg(not(unix))]
    fn wait_for_data(&mut self, timeout: Duration) -> Result<bool, PortError> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if self.bytes_to_read()? > 0 {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            std::thread::sleep(remaining.min(PROBE_STEP));
        }
    }

    fn try_clone(&self) -> Result<Box<dyn SerialDevice>, PortError> {
        #[cfg(unix)]
        let port = self.port()?.try_clone_native().map_err(PortError::Serial)?;
        #[cfg(not(unix))]
        let port = self.port()?.try_clone().map_err(PortError::Serial)?;

        Ok(Box::new(SystemDevice {
            port: Some(port),
            name: self.name.clone(),
        }))
    }

    fn close(&mut self) -> Result<(), PortError> {
        let port = self.port.take().ok_or(PortError::NotOpen)?;
        drop(port);
        debug!(port = %self.name, "device released");
        Ok(())
    }
}

impl std::fmt::Debug for SystemDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemDevice")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .field(
                "baud_rate",
                &self.port.as_ref().and_then(|port| port.baud_rate().ok()),
            )
            .finish()
    }
}

/// Opens devices through the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl DeviceOpener for SystemOpener {
    fn open_device(
        &self,
        port_name: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialDevice>, PortError> {
        Ok(Box::new(SystemDevice::open(port_name, baud_rate, timeout)?))
    }
}
