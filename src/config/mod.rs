//! Configuration module for the recorder.
//!
//! Provides CLI argument parsing and the per-recording settings derived from it.

#[allow(clippy::module_inception)]
mod config;

pub use config::{AppConfig, Mode, RecordingConfig};
