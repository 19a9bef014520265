//! Audio capture and WAV recording.
//!
//! Captures fixed-length mono audio from input devices using cpal, resamples it
//! with rubato when the device cannot run at the requested rate, and writes
//! 16-bit PCM WAV files with hound.

mod capture;
mod recorder;
pub mod resampler;
pub mod util;
mod wav;

pub use capture::CpalBackend;
pub use recorder::{record, record_both};
