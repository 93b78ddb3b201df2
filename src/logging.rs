//! Tracing subscriber setup for binaries and tests.

use crate::settings::{LogFormat, LoggingSettings};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `settings.level`. Fails if a global
/// subscriber is already installed or the level is not a valid filter.
pub fn init_tracing(
    settings: &LoggingSettings,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(rust_log.as_deref(), &settings.level)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true);

    match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    }
}

/// A valid `RUST_LOG` wins; otherwise the configured level must parse.
fn build_filter(rust_log: Option<&str>, level: &str) -> Result<EnvFilter, ParseError> {
    match rust_log.map(EnvFilter::try_new) {
        Some(Ok(filter)) => Ok(filter),
        _ => EnvFilter::try_new(level),
    }
}
