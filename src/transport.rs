//! Deadline-driven exact-size transfers.
//!
//! A device read returns as soon as *some* bytes are available, but callers
//! of [`PortHandle::read_exact`](crate::PortHandle::read_exact) want a fixed
//! number of bytes within one overall timeout, with no inter-byte timeout.
//! These loops repeatedly hand the device the remaining budget until the
//! buffer is full, a transfer times out, or the deadline passes. At least one
//! transfer is always attempted, so a zero timeout behaves as a non-blocking
//! call.

use crate::port::{PortError, SerialDevice};
use std::time::{Duration, Instant};

/// Fill as much of `buffer` as arrives within `timeout`.
///
/// Returns the number of bytes read, which is less than `buffer.len()` only
/// if the timeout elapsed. Never reads past the end of `buffer`.
pub(crate) fn read_exact_into(
    device: &mut dyn SerialDevice,
    buffer: &mut [u8],
    timeout: Duration,
) -> Result<usize, PortError> {
    let clock = Deadline::start(timeout);
    let mut filled = 0;

    while filled < buffer.len() {
        device.set_timeout(clock.remaining())?;
        match device.read_bytes(&mut buffer[filled..])? {
            0 => break,
            n => filled += n,
        }
        if clock.expired() {
            break;
        }
    }
    Ok(filled)
}

/// Push as much of `data` as the device accepts within `timeout`.
///
/// Returns the number of bytes written.
pub(crate) fn write_exact_from(
    device: &mut dyn SerialDevice,
    data: &[u8],
    timeout: Duration,
) -> Result<usize, PortError> {
    let clock = Deadline::start(timeout);
    let mut written = 0;

    while written < data.len() {
        device.set_timeout(clock.remaining())?;
        match device.write_bytes(&data[written..])? {
            0 => break,
            n => written += n,
        }
        if clock.expired() {
            break;
        }
    }
    Ok(written)
}

/// One overall time budget.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    fn expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }
}
