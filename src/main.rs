use clap::Parser;
use serial_link::logging::init_tracing;
use serial_link::{PortHandle, SettingsLoader, SystemOpener};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-tap",
    version,
    about = "Open a serial port, optionally send a line, and print whatever arrives.",
    long_about = "Opens a serial port using the serial-link settings file and environment, \
                  overridden by the flags below. Received bytes are delivered by the event \
                  monitor and written to stdout as they arrive."
)]
struct Args {
    /// Port name or alias (defaults to serial.port from the settings)
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Read timeout in milliseconds
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Write timeout in milliseconds
    #[arg(long)]
    write_timeout_ms: Option<u64>,

    /// Settings file to use instead of the standard locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Text to send once the port is open
    #[arg(short, long)]
    send: Option<String>,

    /// Append CR LF to the sent text
    #[arg(long)]
    crlf: bool,

    /// Print received bytes as hex instead of raw
    #[arg(long)]
    hex: bool,

    /// Stop after this many seconds (runs until killed otherwise)
    #[arg(short, long)]
    duration_secs: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => SettingsLoader::load_from(path)?,
        None => SettingsLoader::load()?,
    };
    let mut settings = loader.into_settings();
    init_tracing(&settings.logging)?;

    if let Some(baud) = args.baud {
        settings.serial.baud_rate = baud;
    }
    if let Some(ms) = args.read_timeout_ms {
        settings.serial.read_timeout_ms = ms;
    }
    if let Some(ms) = args.write_timeout_ms {
        settings.serial.write_timeout_ms = ms;
    }

    let mut port = PortHandle::from_settings(&SystemOpener, &settings.serial, args.port.as_deref())?;
    port.set_monitor_settings(settings.monitor.clone())?;

    if let Some(text) = &args.send {
        let mut line = text.clone().into_bytes();
        if args.crlf {
            line.extend_from_slice(b"\r\n");
        }
        port.write_exact(&line)?;
        info!(port = %port.name(), bytes = line.len(), "sent");
    }

    let hex = args.hex;
    port.enable_event(move |data: &[u8]| {
        let mut stdout = std::io::stdout().lock();
        let result = if hex {
            let rendered: Vec<String> = data.iter().map(|b| format!("{b:02X}")).collect();
            writeln!(stdout, "{}", rendered.join(" "))
        } else {
            stdout.write_all(data)
        };
        let _ = result.and_then(|()| stdout.flush());
    })?;

    match args.duration_secs {
        Some(secs) => std::thread::sleep(Duration::from_secs(secs)),
        None => loop {
            std::thread::park();
        },
    }

    port.close()?;
    Ok(())
}
