//! Settings loader with file resolution and environment override support.

use super::error::{SettingsError, SettingsResult};
use super::schema::{LogFormat, Settings};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_LINK";

/// Settings file name
const SETTINGS_FILE_NAME: &str = "serial-link.toml";

/// Environment variable for an explicit settings path
const SETTINGS_PATH_ENV: &str = "SERIAL_LINK_CONFIG";

/// Settings loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    /// Resolved settings file path (if any)
    pub settings_path: Option<PathBuf>,
    /// The loaded settings
    pub settings: Settings,
}

impl SettingsLoader {
    /// Load settings using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_LINK_CONFIG` environment variable (explicit path)
    /// 2. `./serial-link.toml` (current directory)
    /// 3. `serial-link.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values. The result is validated.
    pub fn load() -> SettingsResult<Self> {
        let settings_path = resolve_settings_path();

        let mut settings = match settings_path {
            Some(ref path) => load_from_file(path)?,
            None => Settings::default(),
        };

        apply_env_overrides(&mut settings)?;
        settings.validate()?;

        Ok(Self {
            settings_path,
            settings,
        })
    }

    /// Load settings from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(SettingsError::NotFound(path));
        }
        let mut settings = load_from_file(&path)?;
        apply_env_overrides(&mut settings)?;
        settings.validate()?;

        Ok(Self {
            settings_path: Some(path),
            settings,
        })
    }

    /// Create a loader with default settings (no file).
    ///
    /// Environment overrides that fail to parse are ignored.
    pub fn with_defaults() -> Self {
        let mut settings = Settings::default();
        let _ = apply_env_overrides(&mut settings);

        Self {
            settings_path: None,
            settings,
        }
    }

    /// Get the loaded settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get a mutable reference to the settings.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Consume the loader and return the settings.
    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Save the current settings to the file they were loaded from.
    pub fn save(&self) -> SettingsResult<()> {
        let path = self
            .settings_path
            .as_ref()
            .ok_or_else(|| SettingsError::MissingRequired("settings file path".to_string()))?;

        save_to_file(&self.settings, path)
    }

    /// Save the current settings to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> SettingsResult<()> {
        save_to_file(&self.settings, path.as_ref())
    }

    /// Reload settings from file (if path is set).
    pub fn reload(&mut self) -> SettingsResult<()> {
        if let Some(ref path) = self.settings_path {
            let mut settings = load_from_file(path)?;
            apply_env_overrides(&mut settings)?;
            settings.validate()?;
            self.settings = settings;
        }
        Ok(())
    }
}

/// Resolve the settings file path using standard locations.
pub fn resolve_settings_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(SETTINGS_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_settings = PathBuf::from(SETTINGS_FILE_NAME);
    if cwd_settings.exists() {
        return Some(cwd_settings);
    }

    get_default_settings_path().filter(|path| path.exists())
}

/// Get the platform config directory for this application.
pub fn get_default_settings_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "serial-link").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default settings file path for creating new settings files.
pub fn get_default_settings_path() -> Option<PathBuf> {
    get_default_settings_dir().map(|dir| dir.join(SETTINGS_FILE_NAME))
}

fn load_from_file(path: &Path) -> SettingsResult<Settings> {
    let content = std::fs::read_to_string(path).map_err(|e| SettingsError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(SettingsError::ParseError)
}

fn save_to_file(settings: &Settings, path: &Path) -> SettingsResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SettingsError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(settings)?;
    std::fs::write(path, content).map_err(|e| SettingsError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// First set variable among `names`, parsed as `T`.
fn env_value<T: FromStr>(names: &[String], message: &str) -> SettingsResult<Option<T>> {
    for name in names {
        if let Ok(raw) = std::env::var(name) {
            return raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| SettingsError::env_parse(name.clone(), message));
        }
    }
    Ok(None)
}

fn prefixed(key: &str) -> String {
    format!("{ENV_PREFIX}_{key}")
}

/// Apply environment variable overrides to the settings.
///
/// Environment variables follow the pattern `SERIAL_LINK_<SECTION>_<KEY>`,
/// for example `SERIAL_LINK_SERIAL_BAUD_RATE=9600`. The hardware-test
/// variables `TEST_PORT`, `TEST_BAUD`, `TEST_TIMEOUT` and `TEST_LOOPBACK`
/// (or `LOOPBACK_ENABLED`) are honoured as fallbacks for the testing section.
fn apply_env_overrides(settings: &mut Settings) -> SettingsResult<()> {
    // Serial overrides
    if let Ok(val) = std::env::var(prefixed("SERIAL_PORT")) {
        settings.serial.port = Some(val);
    }
    if let Some(val) = env_value(&[prefixed("SERIAL_BAUD_RATE")], "Invalid baud rate")? {
        settings.serial.baud_rate = val;
    }
    if let Some(val) = env_value(&[prefixed("SERIAL_READ_TIMEOUT_MS")], "Invalid timeout")? {
        settings.serial.read_timeout_ms = val;
    }
    if let Some(val) = env_value(&[prefixed("SERIAL_WRITE_TIMEOUT_MS")], "Invalid timeout")? {
        settings.serial.write_timeout_ms = val;
    }

    // Monitor overrides
    if let Some(val) = env_value(&[prefixed("MONITOR_POLL_INTERVAL_MS")], "Invalid interval")? {
        settings.monitor.poll_interval_ms = val;
    }
    if let Some(val) = env_value(&[prefixed("MONITOR_BUFFER_CAPACITY")], "Invalid capacity")? {
        settings.monitor.buffer_capacity = val;
    }
    if let Some(val) = env_value(
        &[prefixed("MONITOR_MAX_CONSECUTIVE_FAILURES")],
        "Invalid failure count",
    )? {
        settings.monitor.max_consecutive_failures = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var(prefixed("LOGGING_LEVEL")) {
        settings.logging.level = val;
    }
    if let Ok(val) = std::env::var(prefixed("LOGGING_FORMAT")) {
        settings.logging.format = match val.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => {
                return Err(SettingsError::env_parse(
                    prefixed("LOGGING_FORMAT"),
                    "Expected json, pretty or compact",
                ))
            }
        };
    }

    // Testing overrides (legacy TEST_* names as fallback)
    if let Ok(val) =
        std::env::var(prefixed("TESTING_PORT")).or_else(|_| std::env::var("TEST_PORT"))
    {
        settings.testing.port = Some(val);
    }
    if let Some(val) = env_value(
        &[prefixed("TESTING_BAUD"), "TEST_BAUD".to_string()],
        "Invalid baud rate",
    )? {
        settings.testing.baud = val;
    }
    if let Some(val) = env_value(
        &[prefixed("TESTING_TIMEOUT_MS"), "TEST_TIMEOUT".to_string()],
        "Invalid timeout",
    )? {
        settings.testing.timeout_ms = val;
    }
    if let Ok(val) = std::env::var(prefixed("TESTING_LOOPBACK_ENABLED"))
        .or_else(|_| std::env::var("TEST_LOOPBACK"))
        .or_else(|_| std::env::var("LOOPBACK_ENABLED"))
    {
        let val = val.trim();
        settings.testing.loopback_enabled = val.eq_ignore_ascii_case("true") || val == "1";
    }

    Ok(())
}
