//! Utility functions for hardware testing.
//!
//! Provides test setup/teardown from the environment and timing helpers.

#![allow(dead_code)]

use serial_link::settings::TestingSettings;
use serial_link::{PortHandle, SettingsLoader};
use std::time::{Duration, Instant};

/// Test port configuration from the `testing` settings section.
pub struct TestPortConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub loopback_enabled: bool,
    pub timeout: Duration,
}

impl TestPortConfig {
    /// Load the testing section with environment overrides applied.
    ///
    /// `TEST_PORT` is required; `TEST_BAUD` defaults to 9600, `TEST_TIMEOUT`
    /// (milliseconds) to 1000, and `TEST_LOOPBACK=1` enables loopback tests.
    /// The `SERIAL_LINK_TESTING_*` names work as well.
    pub fn from_env() -> Option<Self> {
        Self::from_settings(&SettingsLoader::with_defaults().settings().testing)
    }

    /// `None` when no test port is configured.
    pub fn from_settings(testing: &TestingSettings) -> Option<Self> {
        Some(TestPortConfig {
            port_name: testing.port.clone()?,
            baud_rate: testing.baud,
            loopback_enabled: testing.loopback_enabled,
            timeout: testing.timeout(),
        })
    }
}

/// Timing helper for measuring operation duration.
pub struct TimingHelper {
    start: Instant,
    name: String,
}

impl TimingHelper {
    pub fn new(name: &str) -> Self {
        println!("Starting: {}", name);
        TimingHelper {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        println!("Completed: {} in {:?}", self.name, elapsed);
        elapsed
    }
}

/// Test fixture holding an open hardware port.
pub struct PortTestFixture {
    pub handle: PortHandle,
    config: TestPortConfig,
}

impl PortTestFixture {
    /// Open the port named by the environment, or `None` if unset/unavailable.
    pub fn setup() -> Option<Self> {
        let config = TestPortConfig::from_env()?;

        println!(
            "Setting up test fixture for {} at {} baud",
            config.port_name, config.baud_rate
        );

        let handle = match PortHandle::open(
            &config.port_name,
            config.baud_rate,
            config.timeout,
            config.timeout,
        ) {
            Ok(h) => h,
            Err(e) => {
                println!("Failed to open port: {}", e);
                return None;
            }
        };

        Some(PortTestFixture { handle, config })
    }

    /// Check if loopback is enabled.
    pub fn is_loopback(&self) -> bool {
        self.config.loopback_enabled
    }

    /// Get the port name.
    pub fn port_name(&self) -> &str {
        &self.config.port_name
    }

    /// Discard anything already buffered by the driver.
    pub fn drain(&mut self) {
        while let Ok(n) = self.handle.bytes_available() {
            if n == 0 || self.handle.read_exact(n).is_err() {
                break;
            }
        }
    }
}

/// Assert that duration is within expected range.
pub fn assert_duration_within(
    actual: Duration,
    expected: Duration,
    tolerance: Duration,
    message: &str,
) {
    let lower = expected.saturating_sub(tolerance);
    let upper = expected + tolerance;

    assert!(
        actual >= lower && actual <= upper,
        "{}: expected {:?} ± {:?}, got {:?}",
        message,
        expected,
        tolerance,
        actual
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_follows_testing_settings() {
        let mut testing = TestingSettings::default();
        assert!(TestPortConfig::from_settings(&testing).is_none());

        testing.port = Some("/dev/ttyTEST0".to_string());
        testing.loopback_enabled = true;
        let config = TestPortConfig::from_settings(&testing).expect("port configured");
        assert_eq!(config.port_name, "/dev/ttyTEST0");
        assert_eq!(config.baud_rate, 9600);
        assert!(config.loopback_enabled);
        assert_eq!(config.timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_timing_helper() {
        let timer = TimingHelper::new("test operation");
        std::thread::sleep(Duration::from_millis(10));
        let elapsed = timer.finish();
        assert!(elapsed >= Duration::from_millis(10));
    }

    #[test]
    fn test_assert_duration_within() {
        assert_duration_within(
            Duration::from_millis(100),
            Duration::from_millis(95),
            Duration::from_millis(10),
            "should be within tolerance",
        );
    }

    #[test]
    #[should_panic]
    fn test_assert_duration_out_of_range() {
        assert_duration_within(
            Duration::from_millis(200),
            Duration::from_millis(100),
            Duration::from_millis(10),
            "should panic",
        );
    }
}
