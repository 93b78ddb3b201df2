//! Settings schema definitions.
//!
//! Every section uses `#[serde(default)]`, so a settings file only needs to
//! name the values it changes.

use super::error::{SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Largest receive buffer the event monitor may allocate.
pub const MAX_MONITOR_BUFFER: usize = 1 << 20;

/// Root settings structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Serial port defaults
    pub serial: SerialSettings,
    /// Event monitor tuning
    pub monitor: MonitorSettings,
    /// Logging
    pub logging: LoggingSettings,
    /// Hardware testing
    pub testing: TestingSettings,
}

impl Settings {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> SettingsResult<()> {
        self.serial.validate()?;
        self.monitor.validate()?;
        Ok(())
    }
}

/// Serial port section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Port to open when none is given explicitly
    pub port: Option<String>,
    /// Baud rate applied at open
    pub baud_rate: u32,
    /// Overall timeout of one exact-size read, in milliseconds
    pub read_timeout_ms: u64,
    /// Overall timeout of one exact-size write, in milliseconds
    pub write_timeout_ms: u64,
    /// Port aliases for convenience
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            read_timeout_ms: 1000,
            write_timeout_ms: 1000,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialSettings {
    /// Get the read timeout as Duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Get the write timeout as Duration
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn validate(&self) -> SettingsResult<()> {
        if self.baud_rate == 0 {
            return Err(SettingsError::validation(
                "serial.baud_rate",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Event monitor section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Upper bound of one wait for data; also the retry back-off
    pub poll_interval_ms: u64,
    /// Size of the monitor's receive buffer (largest chunk delivered)
    pub buffer_capacity: usize,
    /// Consecutive failed cycles before the monitor stops
    pub max_consecutive_failures: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            buffer_capacity: 4096,
            max_consecutive_failures: 5,
        }
    }
}

impl MonitorSettings {
    /// Get the poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> SettingsResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(SettingsError::validation(
                "monitor.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.buffer_capacity == 0 || self.buffer_capacity > MAX_MONITOR_BUFFER {
            return Err(SettingsError::validation(
                "monitor.buffer_capacity",
                format!("must be between 1 and {MAX_MONITOR_BUFFER}"),
            ));
        }
        if self.max_consecutive_failures == 0 {
            return Err(SettingsError::validation(
                "monitor.max_consecutive_failures",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset, e.g. "info" or "serial_link=debug"
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

/// Hardware testing section, read by the `hardware-tests` suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingSettings {
    /// Test port name
    pub port: Option<String>,
    /// Test baud rate
    pub baud: u32,
    /// Whether TX and RX of the test port are jumpered
    pub loopback_enabled: bool,
    /// Test timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for TestingSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud: 9600,
            loopback_enabled: false,
            timeout_ms: 1000,
        }
    }
}

impl TestingSettings {
    /// Get the test timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
