//! duorec - fixed-length audio recorder.
//!
//! Records a set number of seconds from one input device, or from a microphone
//! and a system-output (loopback) device at the same time, and saves each capture
//! as an auto-numbered mono 16-bit WAV file.

mod audio;
mod config;
mod naming;

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::{FormatTime, OffsetTime};

use audio::{CpalBackend, record, record_both};
use config::{AppConfig, Mode};

/// Wall-clock timer for log lines.
///
/// The local UTC offset can only be read safely while the process is still
/// single-threaded, so it is resolved here once and reused by every thread.
/// Falls back to UTC when the offset is unavailable.
fn log_timer() -> impl FormatTime {
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    OffsetTime::new(offset, time::macros::format_description!("[hour]:[minute]:[second]"))
}

/// Initialize logging.
///
/// Respects `RUST_LOG`, falls back to the verbose flag, defaults to info. With
/// `--log-file` the output is appended to that file without colors. Must run
/// before any worker thread is spawned.
fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| if config.verbose { EnvFilter::try_new("debug") } else { EnvFilter::try_new("info") })?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(log_timer());

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            subscriber.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => subscriber.init(),
    }

    Ok(())
}

/// Record one device into `{single_name}_NNN.{extension}`.
///
/// # Returns
/// `true` if the file was written.
fn run_single(config: &AppConfig, backend: &CpalBackend) -> Result<bool> {
    let path = naming::next_path(&config.output_dir, &config.single_name, &config.extension)?;
    create_output_dir(config)?;

    let recording = config.recording(config.mic_device, path);
    match record(backend, &recording) {
        Ok(path) => {
            info!("💾 Saved {}", path.display());
            Ok(true)
        }
        Err(e) => {
            error!("❌ Recording from device {} failed: {}", recording.device_index, e);
            Ok(false)
        }
    }
}

/// Record the mic and output devices together into `{mic_name}_NNN` / `{out_name}_NNN`.
///
/// # Returns
/// `true` if both files were written. Every failure is logged.
fn run_dual(config: &AppConfig, backend: &CpalBackend) -> Result<bool> {
    let mic_path = naming::next_path(&config.output_dir, &config.mic_name, &config.extension)?;
    let out_path = naming::next_path(&config.output_dir, &config.out_name, &config.extension)?;
    create_output_dir(config)?;

    let mic = config.recording(config.mic_device, mic_path);
    let out = config.recording(config.out_device, out_path);

    let result = record_both(backend, &mic, &out);

    for (role, outcome) in result.outcomes() {
        match outcome {
            Ok(path) => info!("💾 Saved {} recording to {}", role, path.display()),
            Err(e) => error!("❌ {} recording failed: {}", role, e),
        }
    }

    let failed = result.failures().count();
    if failed > 0 {
        error!("{} of 2 recordings failed", failed);
    }

    Ok(result.is_success())
}

fn create_output_dir(config: &AppConfig) -> Result<()> {
    fs::create_dir_all(&config.output_dir).with_context(|| format!("Failed to create output directory {}", config.output_dir.display()))
}

fn main() -> Result<()> {
    // Parse command line arguments
    let config = AppConfig::from_args();

    init_logging(&config)?;

    info!("🎙️ duorec v{}", env!("CARGO_PKG_VERSION"));

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }

    config.log_config();

    let backend = CpalBackend::new();
    let outcome = match config.mode {
        Mode::Single => run_single(&config, &backend),
        Mode::Dual => run_dual(&config, &backend),
    };

    match outcome {
        Ok(true) => {
            info!("✅ Application finished");
            Ok(())
        }
        Ok(false) => {
            error!("Application finished with failed recordings");
            std::process::exit(1);
        }
        Err(e) => {
            error!("❌ {:#}", e);
            std::process::exit(1);
        }
    }
}
