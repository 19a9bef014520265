//! Application configuration and CLI argument parsing.

use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::info;

/// Highest sample rate accepted on the command line.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Most 16-bit samples one WAV file can hold (RIFF sizes are 32-bit, 44-byte header).
pub const MAX_WAV_SAMPLES: u64 = (u32::MAX as u64 - 44) / 2;

/// Whether to record one device or the mic and the system output together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Mode {
    /// Record only the mic device
    Single,
    /// Record the mic and output devices at the same time (default)
    #[default]
    Dual,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Single => write!(f, "single"),
            Mode::Dual => write!(f, "dual"),
        }
    }
}

/// Everything one capture needs. Built once per recording and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingConfig {
    pub duration_secs: u32,
    pub sample_rate: u32,
    pub device_index: usize,
    pub output_path: PathBuf,
}

impl RecordingConfig {
    /// Number of mono samples a full recording holds.
    pub fn sample_count(&self) -> usize {
        self.duration_secs as usize * self.sample_rate as usize
    }
}

/// Recorder configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "duorec")]
#[command(author, version, about = "Record fixed-length WAV files from one or two audio devices", long_about = None)]
pub struct AppConfig {
    /// Record a single device or mic + system output together
    #[arg(long, value_enum, default_value = "dual")]
    pub mode: Mode,

    /// Directory the numbered WAV files are written to
    #[arg(long, short = 'o', env = "DUOREC_OUTPUT_DIR", default_value = "./data/recordings")]
    pub output_dir: PathBuf,

    /// Recording length in seconds
    #[arg(long, short = 'd', default_value = "10")]
    pub duration: u32,

    /// Sample rate of the written files in Hz
    #[arg(long, short = 'r', default_value = "44100")]
    pub sample_rate: u32,

    /// Input device index for the microphone (also used in single mode)
    #[arg(long, default_value = "1")]
    pub mic_device: usize,

    /// Input device index capturing the system output (loopback or monitor source)
    #[arg(long, default_value = "2")]
    pub out_device: usize,

    /// Base filename for microphone recordings
    #[arg(long, default_value = "mic")]
    pub mic_name: String,

    /// Base filename for system output recordings
    #[arg(long, default_value = "out")]
    pub out_name: String,

    /// Base filename in single mode
    #[arg(long, default_value = "recording")]
    pub single_name: String,

    /// Output file extension
    #[arg(long, default_value = "wav")]
    pub extension: String,

    /// Append logs to this file instead of the terminal
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl AppConfig {
    /// Parse configuration from command line arguments.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Build the capture settings for one device writing to `output_path`.
    pub fn recording(&self, device_index: usize, output_path: impl Into<PathBuf>) -> RecordingConfig {
        RecordingConfig {
            duration_secs: self.duration,
            sample_rate: self.sample_rate,
            device_index,
            output_path: output_path.into(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.duration == 0 {
            anyhow::bail!("Duration must be at least 1 second");
        }

        if self.sample_rate == 0 {
            anyhow::bail!("Sample rate must be positive");
        }

        if self.sample_rate > MAX_SAMPLE_RATE {
            anyhow::bail!("Sample rate must be at most {} Hz, got {}", MAX_SAMPLE_RATE, self.sample_rate);
        }

        let samples = self.duration as u64 * self.sample_rate as u64;
        if samples > MAX_WAV_SAMPLES || usize::try_from(samples).is_err() {
            anyhow::bail!(
                "{} s at {} Hz does not fit in one WAV file (max {} s at this rate)",
                self.duration,
                self.sample_rate,
                MAX_WAV_SAMPLES / self.sample_rate as u64
            );
        }

        check_name_part("extension", &self.extension)?;

        match self.mode {
            Mode::Single => check_name_part("single name", &self.single_name)?,
            Mode::Dual => {
                check_name_part("mic name", &self.mic_name)?;
                check_name_part("out name", &self.out_name)?;

                if self.mic_device == self.out_device {
                    anyhow::bail!("Mic and output device must differ (both are {})", self.mic_device);
                }

                if self.mic_name == self.out_name {
                    anyhow::bail!("Mic and output base names must differ (both are {:?})", self.mic_name);
                }
            }
        }

        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        info!("  Mode: {}", self.mode);
        info!("  Output directory: {}", self.output_dir.display());
        info!("  Duration: {} s", self.duration);
        info!("  Sample rate: {} Hz", self.sample_rate);
        match self.mode {
            Mode::Single => {
                info!("  Device: {}", self.mic_device);
                info!("  File pattern: {}_NNN.{}", self.single_name, self.extension);
            }
            Mode::Dual => {
                info!("  Mic device: {} ({}_NNN.{})", self.mic_device, self.mic_name, self.extension);
                info!("  Output device: {} ({}_NNN.{})", self.out_device, self.out_name, self.extension);
            }
        }
        if let Some(ref log_file) = self.log_file {
            info!("  Log file: {}", log_file.display());
        }
    }
}

/// Reject base names and extensions that would escape the output directory.
fn check_name_part(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        anyhow::bail!("The {} must not be empty", what);
    }

    let mut components = Path::new(value).components();
    let plain = matches!((components.next(), components.next()), (Some(Component::Normal(_)), None));
    if value.contains(['/', '\\']) || !plain {
        anyhow::bail!("The {} must be a plain name, got {:?}", what, value);
    }

    Ok(())
}
