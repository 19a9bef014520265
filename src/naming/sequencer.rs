//! Next-filename lookup based on the highest numbered file already present.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Minimum number of digits in the rendered suffix.
const SUFFIX_WIDTH: usize = 3;

/// Errors produced while looking for the next free filename.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("failed to list directory {}: {source}", dir.display())]
    ReadDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid filename pattern for base {base:?} and extension {extension:?}: {source}")]
    Pattern {
        base: String,
        extension: String,
        #[source]
        source: regex::Error,
    },

    #[error("numbering for {base:?} is exhausted")]
    Exhausted { base: String },
}

/// A `{base}_{number}.{extension}` naming scheme.
#[derive(Debug, Clone)]
pub struct FilenamePattern {
    base: String,
    extension: String,
    matcher: Regex,
}

impl FilenamePattern {
    /// Build a pattern. Base and extension are matched literally.
    pub fn new(base: &str, extension: &str) -> Result<Self, SequenceError> {
        let matcher = Regex::new(&format!(r"^{}_(\d+)\.{}$", regex::escape(base), regex::escape(extension))).map_err(|source| SequenceError::Pattern {
            base: base.to_string(),
            extension: extension.to_string(),
            source,
        })?;

        Ok(Self {
            base: base.to_string(),
            extension: extension.to_string(),
            matcher,
        })
    }

    /// Extract the numeric suffix if `name` follows this pattern.
    ///
    /// Suffixes that do not fit in a `u64` are treated as non-matching.
    pub fn number_of(&self, name: &str) -> Option<u64> {
        let captures = self.matcher.captures(name)?;
        captures[1].parse().ok()
    }

    /// Render the filename for `number`, zero-padded to at least three digits.
    pub fn render(&self, number: u64) -> String {
        format!("{}_{:0width$}.{}", self.base, number, self.extension, width = SUFFIX_WIDTH)
    }
}

/// Return the next unused numbered filename in `directory`.
///
/// Only the highest existing number matters: gaps are never filled. A missing
/// directory counts as empty. Any other listing failure is returned (not logged)
/// so the caller can report it once and abort before recording anything.
///
/// # Arguments
/// * `directory` - Directory to scan
/// * `base` - Filename stem before the number (e.g. "recording")
/// * `extension` - Extension without the dot (e.g. "wav")
///
/// # Returns
/// A bare filename such as `recording_003.wav`.
pub fn next_filename(directory: impl AsRef<Path>, base: &str, extension: &str) -> Result<String, SequenceError> {
    let directory = directory.as_ref();
    let pattern = FilenamePattern::new(base, extension)?;

    let highest = match highest_number(directory, &pattern) {
        Ok(highest) => highest,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Directory {} does not exist, numbering starts at 0", directory.display());
            None
        }
        Err(source) => {
            return Err(SequenceError::ReadDir {
                dir: directory.to_path_buf(),
                source,
            });
        }
    };

    let next = match highest {
        None => 0,
        Some(n) => n.checked_add(1).ok_or_else(|| SequenceError::Exhausted { base: base.to_string() })?,
    };

    Ok(pattern.render(next))
}

/// Same as [`next_filename`], joined onto `directory`.
pub fn next_path(directory: impl AsRef<Path>, base: &str, extension: &str) -> Result<PathBuf, SequenceError> {
    let directory = directory.as_ref();
    Ok(directory.join(next_filename(directory, base, extension)?))
}

fn highest_number(directory: &Path, pattern: &FilenamePattern) -> io::Result<Option<u64>> {
    let mut highest = None;

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };

        if let Some(number) = pattern.number_of(&name) {
            highest = highest.max(Some(number));
        }
    }

    Ok(highest)
}
