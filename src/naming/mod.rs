//! Output filename sequencing.
//!
//! Picks the next free `{base}_{NNN}.{ext}` name in a directory so new recordings
//! never overwrite old ones.

mod sequencer;

pub use sequencer::next_path;
