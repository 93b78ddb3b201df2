//! Event-driven receive monitor.
//!
//! Once a handler is registered on a [`PortHandle`](crate::PortHandle), a
//! dedicated worker thread owns a clone of the device and loops:
//!
//! ```text
//! wait_for_data(poll interval) ─► bytes_to_read ─► read_exact (≤ capacity) ─► handler.on_data
//!        ▲                                                                        │
//!        └──────────────────────── cancel flag checked ◄──────────────────────────┘
//! ```
//!
//! Waits are bounded by the poll interval so the cancel flag is observed even
//! on an idle line. Failures are logged and retried after one poll interval;
//! after `max_consecutive_failures` in a row the monitor stops and reports
//! [`MonitorError::RetriesExhausted`] to the handler.
//!
//! The worker hands its device clone back through the join handle when it
//! exits, so the clone is only dropped when the owner stops the monitor.
//! Dropping a system port clears the exclusive lock on the shared line.

use crate::port::{PortError, SerialDevice};
use crate::settings::MonitorSettings;
use crate::transport;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Receives data delivered by the event monitor.
///
/// Closures of the form `FnMut(&[u8])` implement this trait.
pub trait EventHandler: Send + 'static {
    /// Called on the monitor thread with the bytes just received.
    ///
    /// The slice is only valid for the duration of the call; `data.len()` is
    /// the byte count. Long-running work here delays further reads.
    fn on_data(&mut self, data: &[u8]);

    /// Called once if the monitor gives up.
    fn on_terminated(&mut self, error: &MonitorError) {
        let _ = error;
    }
}

impl<F> EventHandler for F
where
    F: FnMut(&[u8]) + Send + 'static,
{
    fn on_data(&mut self, data: &[u8]) {
        self(data)
    }
}

/// Terminal monitor failure reported through [`EventHandler::on_terminated`].
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("event monitor stopped after {failures} consecutive failures: {last}")]
    RetriesExhausted { failures: u32, last: PortError },
}

/// Lifecycle of a handle's event monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No handler registered.
    Idle,
    /// Handler registered, worker not yet looping.
    Armed,
    /// Worker loop active.
    Running,
    /// Worker exited (cancelled, failure budget spent, or handler panicked).
    Stopped,
}

impl MonitorState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Armed,
            2 => Self::Running,
            3 => Self::Stopped,
            _ => Self::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Armed => 1,
            Self::Running => 2,
            Self::Stopped => 3,
        }
    }
}

/// Shared, lock-free view of a [`MonitorState`].
#[derive(Debug, Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new(state: MonitorState) -> Self {
        Self(Arc::new(AtomicU8::new(state.as_u8())))
    }

    fn get(&self) -> MonitorState {
        MonitorState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: MonitorState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

/// Marks the monitor stopped however the worker exits, including unwinding
/// out of a panicking handler.
struct StoppedOnExit(SharedState);

impl Drop for StoppedOnExit {
    fn drop(&mut self) {
        self.0.set(MonitorState::Stopped);
    }
}

/// Handle to a running monitor, owned by the port handle.
#[derive(Debug)]
pub(crate) struct EventMonitor {
    state: SharedState,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<Box<dyn SerialDevice>>>,
}

impl EventMonitor {
    /// Start a worker that reads from `device` and feeds `handler`.
    ///
    /// `read_timeout_ms` is shared with the owning handle so timeout changes
    /// apply from the next cycle.
    pub(crate) fn spawn(
        port_name: &str,
        device: Box<dyn SerialDevice>,
        handler: Box<dyn EventHandler>,
        settings: &MonitorSettings,
        read_timeout_ms: Arc<AtomicU64>,
    ) -> std::io::Result<Self> {
        let state = SharedState::new(MonitorState::Armed);
        let cancel = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            port_name: port_name.to_string(),
            device,
            handler,
            buffer: vec![0u8; settings.buffer_capacity.max(1)],
            poll_interval: settings.poll_interval().max(MIN_POLL_INTERVAL),
            max_failures: settings.max_consecutive_failures.max(1),
            read_timeout_ms,
            cancel: Arc::clone(&cancel),
            state: state.clone(),
        };

        let worker = thread::Builder::new()
            .name(format!("serial-monitor:{port_name}"))
            .spawn(move || worker.run())?;

        Ok(Self {
            state,
            cancel,
            worker: Some(worker),
        })
    }

    pub(crate) fn state(&self) -> MonitorState {
        self.state.get()
    }

    /// Signal cancellation, wait for the worker to exit and release its
    /// device clone.
    pub(crate) fn stop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(device) => {
                    drop(device);
                    debug!("event monitor device released");
                }
                Err(_) => warn!("event monitor thread panicked"),
            }
        }
        self.state.set(MonitorState::Stopped);
    }
}

impl Drop for EventMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Lower bound on the wait slice so an idle line never spins.
pub(crate) const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// State owned by the monitor thread.
struct Worker {
    port_name: String,
    device: Box<dyn SerialDevice>,
    handler: Box<dyn EventHandler>,
    /// Private receive buffer; its length is the largest chunk delivered.
    buffer: Vec<u8>,
    poll_interval: Duration,
    max_failures: u32,
    read_timeout_ms: Arc<AtomicU64>,
    cancel: Arc<AtomicBool>,
    state: SharedState,
}

impl Worker {
    /// Loop until cancelled, the failure budget is spent or the handler
    /// panics, then give the device back to the owner.
    fn run(mut self) -> Box<dyn SerialDevice> {
        let _stopped = StoppedOnExit(self.state.clone());
        self.state.set(MonitorState::Running);
        info!(port = %self.port_name, capacity = self.buffer.len(), "event monitor running");

        let mut failures = 0u32;
        while !self.cancel.load(Ordering::Acquire) {
            match self.cycle() {
                Ok(true) => failures = 0,
                Ok(false) => {
                    error!(port = %self.port_name, "event handler panicked, stopping monitor");
                    return self.device;
                }
                Err(err) => {
                    failures += 1;
                    if failures >= self.max_failures {
                        error!(
                            port = %self.port_name,
                            failures,
                            error = %err,
                            "event monitor giving up"
                        );
                        let reason = MonitorError::RetriesExhausted {
                            failures,
                            last: err,
                        };
                        let handler = &mut self.handler;
                        if panic::catch_unwind(AssertUnwindSafe(|| handler.on_terminated(&reason)))
                            .is_err()
                        {
                            error!(port = %self.port_name, "event handler panicked in on_terminated");
                        }
                        return self.device;
                    }
                    warn!(
                        port = %self.port_name,
                        failures,
                        error = %err,
                        "event monitor cycle failed, retrying"
                    );
                    thread::sleep(self.poll_interval);
                }
            }
        }
        info!(port = %self.port_name, "event monitor cancelled");
        self.device
    }

    /// One wait/probe/read/deliver pass. `Ok(false)` means the handler
    /// panicked.
    fn cycle(&mut self) -> Result<bool, PortError> {
        if !self.device.wait_for_data(self.poll_interval)? {
            return Ok(true);
        }

        let available = self.device.bytes_to_read()?;
        if available == 0 {
            // Woken without data; don't spin on a line that keeps signalling.
            thread::sleep(self.poll_interval);
            return Ok(true);
        }

        let chunk = available.min(self.buffer.len());
        if available > chunk {
            debug!(
                port = %self.port_name,
                available,
                chunk,
                "pending data exceeds monitor buffer, delivering in chunks"
            );
        }

        let timeout = Duration::from_millis(self.read_timeout_ms.load(Ordering::Relaxed));
        let read = transport::read_exact_into(&mut *self.device, &mut self.buffer[..chunk], timeout)?;
        if read < chunk {
            warn!(
                port = %self.port_name,
                expected = chunk,
                read,
                "short read in event monitor"
            );
        }
        if read == 0 {
            return Ok(true);
        }
        let handler = &mut self.handler;
        let data = &self.buffer[..read];
        Ok(panic::catch_unwind(AssertUnwindSafe(|| handler.on_data(data))).is_ok())
    }
}
