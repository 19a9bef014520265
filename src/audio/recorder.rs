//! Fixed-duration recording to WAV, for one device or two devices at once.

use std::io;
use std::path::PathBuf;
use std::thread::{self, Scope, ScopedJoinHandle};

use thiserror::Error;
use tracing::{debug, info};

use super::capture::{CaptureBackend, CaptureError};
use super::wav::write_mono_wav;
use crate::config::RecordingConfig;

/// Errors from a single recording.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("capture from device {device} failed: {source}")]
    Capture {
        device: usize,
        #[source]
        source: CaptureError,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start recording thread for device {device}: {source}")]
    Spawn {
        device: usize,
        #[source]
        source: io::Error,
    },

    #[error("recording thread for device {device} panicked")]
    WorkerPanicked { device: usize },
}

/// Outcome of a mic + output recording. Both sides are always reported.
#[derive(Debug)]
pub struct DualRecording {
    pub mic: Result<PathBuf, RecordError>,
    pub out: Result<PathBuf, RecordError>,
}

impl DualRecording {
    /// True when both files were written.
    pub fn is_success(&self) -> bool {
        self.mic.is_ok() && self.out.is_ok()
    }

    /// Both outcomes labelled with their role ("mic" or "out").
    pub fn outcomes(&self) -> [(&'static str, &Result<PathBuf, RecordError>); 2] {
        [("mic", &self.mic), ("out", &self.out)]
    }

    /// Failed recordings labelled with their role.
    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &RecordError)> {
        self.outcomes().into_iter().filter_map(|(role, outcome)| outcome.as_ref().err().map(|e| (role, e)))
    }
}

/// Record `config.duration_secs` seconds from one device and save it as WAV.
///
/// Blocks for the whole capture. Nothing is written if the capture fails.
///
/// # Arguments
/// * `backend` - Capture implementation (cpal in production)
/// * `config` - Device, duration, sample rate and destination
///
/// # Returns
/// The path of the written file.
pub fn record<B>(backend: &B, config: &RecordingConfig) -> Result<PathBuf, RecordError>
where
    B: CaptureBackend + ?Sized,
{
    let device = config.device_index;
    let mut buffer = vec![0i16; config.sample_count()];

    info!("Recording from device {} started ({} s at {} Hz)", device, config.duration_secs, config.sample_rate);
    backend
        .capture(device, config.sample_rate, &mut buffer)
        .map_err(|source| RecordError::Capture { device, source })?;
    info!("Recording from device {} finished", device);

    write_mono_wav(&config.output_path, config.sample_rate, &buffer).map_err(|source| RecordError::Write {
        path: config.output_path.clone(),
        source,
    })?;
    debug!("Wrote {} samples to {}", buffer.len(), config.output_path.display());

    Ok(config.output_path.clone())
}

/// Record the mic and the system output at the same time.
///
/// Each recording runs on its own thread so both devices start capturing as
/// close together as possible. Returns once both threads have finished; a
/// failure on one side does not stop the other.
pub fn record_both<B>(backend: &B, mic: &RecordingConfig, out: &RecordingConfig) -> DualRecording
where
    B: CaptureBackend + ?Sized,
{
    info!("Recording started");

    let result = thread::scope(|scope| {
        let mic_handle = spawn_worker(scope, "rec-mic", backend, mic);
        let out_handle = spawn_worker(scope, "rec-out", backend, out);

        DualRecording {
            mic: join_worker(mic_handle, mic.device_index),
            out: join_worker(out_handle, out.device_index),
        }
    });

    info!("Recording complete");
    result
}

type WorkerHandle<'scope> = ScopedJoinHandle<'scope, Result<PathBuf, RecordError>>;

fn spawn_worker<'scope, 'env, B>(
    scope: &'scope Scope<'scope, 'env>,
    name: &str,
    backend: &'env B,
    config: &'env RecordingConfig,
) -> Result<WorkerHandle<'scope>, RecordError>
where
    B: CaptureBackend + ?Sized,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn_scoped(scope, move || record(backend, config))
        .map_err(|source| RecordError::Spawn {
            device: config.device_index,
            source,
        })
}

fn join_worker(handle: Result<WorkerHandle<'_>, RecordError>, device: usize) -> Result<PathBuf, RecordError> {
    handle?.join().unwrap_or(Err(RecordError::WorkerPanicked { device }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use hound::WavReader;
    use parking_lot::Mutex;

    use crate::audio::wav::mono_pcm16_spec;

    /// Backend that fills buffers with the device index and tracks overlap.
    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<(usize, u32, usize)>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
        failing: Vec<usize>,
        panicking: Vec<usize>,
    }

    impl CaptureBackend for FakeBackend {
        fn capture(&self, device_index: usize, sample_rate: u32, buffer: &mut [i16]) -> Result<(), CaptureError> {
            self.calls.lock().push((device_index, sample_rate, buffer.len()));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            std::thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panicking.contains(&device_index) {
                panic!("device {device_index} exploded");
            }
            if self.failing.contains(&device_index) {
                return Err(CaptureError::NoSuchDevice {
                    index: device_index,
                    available: 0,
                });
            }

            buffer.fill(device_index as i16);
            Ok(())
        }
    }

    fn recording(dir: &Path, name: &str, device_index: usize) -> RecordingConfig {
        RecordingConfig {
            duration_secs: 2,
            sample_rate: 8000,
            device_index,
            output_path: dir.join(name),
        }
    }

    fn read_samples(path: &Path) -> (hound::WavSpec, Vec<i16>) {
        let mut reader = WavReader::open(path).unwrap();
        let samples = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        (reader.spec(), samples)
    }

    #[test]
    fn test_record_writes_full_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::default();
        let config = recording(dir.path(), "recording_000.wav", 5);

        let path = record(&backend, &config).unwrap();

        assert_eq!(path, config.output_path);
        let (spec, samples) = read_samples(&path);
        assert_eq!(spec, mono_pcm16_spec(8000));
        assert_eq!(samples.len(), 2 * 8000);
        assert!(samples.iter().all(|&s| s == 5));
        assert_eq!(*backend.calls.lock(), vec![(5, 8000, 16000)]);
    }

    #[test]
    fn test_record_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            failing: vec![3],
            ..Default::default()
        };
        let config = recording(dir.path(), "recording_000.wav", 3);

        let err = record(&backend, &config).unwrap_err();

        assert!(matches!(err, RecordError::Capture { device: 3, .. }));
        assert!(!config.output_path.exists());
    }

    #[test]
    fn test_record_both_runs_devices_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            delay: Duration::from_millis(150),
            ..Default::default()
        };
        let mic = recording(dir.path(), "mic_000.wav", 1);
        let out = recording(dir.path(), "out_000.wav", 2);

        let result = record_both(&backend, &mic, &out);

        assert!(result.is_success());
        assert_eq!(result.failures().count(), 0);
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 2);
        assert_eq!(backend.in_flight.load(Ordering::SeqCst), 0);

        let mut calls = backend.calls.lock().clone();
        calls.sort();
        assert_eq!(calls, vec![(1, 8000, 16000), (2, 8000, 16000)]);

        let (_, mic_samples) = read_samples(&mic.output_path);
        let (_, out_samples) = read_samples(&out.output_path);
        assert!(mic_samples.iter().all(|&s| s == 1));
        assert!(out_samples.iter().all(|&s| s == 2));
    }

    #[test]
    fn test_one_failure_does_not_stop_the_other() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            failing: vec![2],
            ..Default::default()
        };
        let mic = recording(dir.path(), "mic_000.wav", 1);
        let out = recording(dir.path(), "out_000.wav", 2);

        let result = record_both(&backend, &mic, &out);

        assert!(!result.is_success());
        assert_eq!(result.mic.as_ref().unwrap(), &mic.output_path);
        assert!(mic.output_path.exists());
        assert!(!out.output_path.exists());

        let failures: Vec<_> = result.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "out");
        assert!(matches!(failures[0].1, RecordError::Capture { device: 2, .. }));
    }

    #[test]
    fn test_both_failures_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            failing: vec![1],
            panicking: vec![2],
            ..Default::default()
        };
        let mic = recording(dir.path(), "mic_000.wav", 1);
        let out = recording(dir.path(), "out_000.wav", 2);

        let result = record_both(&backend, &mic, &out);

        let roles: Vec<_> = result.failures().map(|(role, _)| role).collect();
        assert_eq!(roles, vec!["mic", "out"]);
        assert!(matches!(result.mic, Err(RecordError::Capture { device: 1, .. })));
        assert!(matches!(result.out, Err(RecordError::WorkerPanicked { device: 2 })));
    }
}
