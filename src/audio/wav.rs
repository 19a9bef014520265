//! Mono 16-bit PCM WAV output.

use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tempfile::NamedTempFile;

/// Spec of every file the recorder writes: one channel, 16-bit integer PCM.
pub fn mono_pcm16_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Write `samples` to `path`, replacing any existing file.
///
/// The data goes to a temporary file next to `path` first and is renamed into
/// place once finalized, so a failure never leaves a truncated WAV behind.
pub fn write_mono_wav(path: &Path, sample_rate: u32, samples: &[i16]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = WavWriter::new(BufWriter::new(temp.as_file()), mono_pcm16_spec(sample_rate)).map_err(hound_to_io)?;
        for &sample in samples {
            writer.write_sample(sample).map_err(hound_to_io)?;
        }
        writer.finalize().map_err(hound_to_io)?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn hound_to_io(err: hound::Error) -> std::io::Error {
    match err {
        hound::Error::IoError(e) => e,
        other => std::io::Error::other(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    #[test]
    fn test_write_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip_000.wav");
        let samples: Vec<i16> = (0..800).map(|i| (i * 40) as i16).collect();

        write_mono_wav(&path, 8000, &samples).unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec(), mono_pcm16_spec(8000));
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, samples);
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip_000.wav");
        std::fs::write(&path, b"not a wav").unwrap();

        write_mono_wav(&path, 16000, &[1, 2, 3]).unwrap();

        let reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 3);
        // Only the final file is left in the directory
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_directory_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("clip_000.wav");
        assert!(write_mono_wav(&path, 16000, &[0; 16]).is_err());
        assert!(!path.exists());
    }
}
