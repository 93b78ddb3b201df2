//! Settings for serial_link.
//!
//! TOML-based settings with environment variable overrides.
//!
//! # Resolution
//!
//! Settings are loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_LINK_CONFIG` environment variable (explicit path)
//! 2. `./serial-link.toml` (current directory)
//! 3. `serial-link.toml` in the platform config directory
//!    (`~/.config/serial-link/` on Linux, `%APPDATA%\serial-link\config\` on Windows)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Any value can be overridden with `SERIAL_LINK_<SECTION>_<KEY>`, e.g.
//! `SERIAL_LINK_SERIAL_PORT=/dev/ttyUSB0` or
//! `SERIAL_LINK_MONITOR_POLL_INTERVAL_MS=20`.
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_link::settings::SettingsLoader;
//!
//! let loader = SettingsLoader::load()?;
//! let settings = loader.settings();
//! println!("Default baud: {}", settings.serial.baud_rate);
//! # Ok::<(), serial_link::settings::SettingsError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{SettingsError, SettingsResult};
pub use loader::{
    get_default_settings_dir, get_default_settings_path, resolve_settings_path, SettingsLoader,
};
pub use schema::{
    LogFormat, LoggingSettings, MonitorSettings, SerialSettings, Settings, TestingSettings,
    MAX_MONITOR_BUFFER,
};
