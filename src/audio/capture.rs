//! Blocking fixed-length capture from an input device.
//!
//! `CaptureBackend` is the seam between the recorder and the audio hardware. The
//! cpal implementation opens the device by index, streams into a lock-free ring
//! buffer and drains it on the calling thread until the requested number of
//! samples has arrived.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::resampler::resample;
use super::util::{convert_to_mono, find_best_config, get_device_name, sample_to_i16};

/// Quiet period after which a waiting capture logs a warning. The capture keeps waiting.
pub const QUIET_WARNING: Duration = Duration::from_secs(3);

/// Sleep between ring buffer drains.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Minimum ring buffer size in samples (~1.5 seconds at 44.1kHz).
const MIN_RING_SIZE: usize = 65536;

/// Errors raised while capturing from a device.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device with index {index} ({available} available)")]
    NoSuchDevice { index: usize, available: usize },

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query configurations of device {index}: {source}")]
    Configs {
        index: usize,
        #[source]
        source: cpal::SupportedStreamConfigsError,
    },

    #[error("device {index} has no usable configuration: {reason}")]
    NoSupportedConfig { index: usize, reason: String },

    #[error("device {index} uses unsupported sample format {format:?}")]
    UnsupportedFormat { index: usize, format: SampleFormat },

    #[error("failed to open stream on device {index}: {source}")]
    BuildStream {
        index: usize,
        #[source]
        source: cpal::BuildStreamError,
    },

    #[error("failed to start stream on device {index}: {source}")]
    PlayStream {
        index: usize,
        #[source]
        source: cpal::PlayStreamError,
    },

    #[error("stream error on device {index}: {message}")]
    Stream { index: usize, message: String },

    #[error("capture produced {got} samples, expected {expected}")]
    ShortCapture { expected: usize, got: usize },

    #[error("resampling failed: {0}")]
    Resample(String),
}

/// Something that can record a fixed number of mono samples from a device.
pub trait CaptureBackend: Sync {
    /// Fill `buffer` with mono 16-bit samples captured from `device_index` at
    /// `sample_rate`. Blocks until the buffer is full or the capture fails.
    fn capture(&self, device_index: usize, sample_rate: u32, buffer: &mut [i16]) -> Result<(), CaptureError>;
}

/// Capture backend using the platform's default cpal host.
#[derive(Debug, Clone)]
pub struct CpalBackend {
    quiet_warning: Duration,
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self { quiet_warning: QUIET_WARNING }
    }
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the input device at `index` in the host's enumeration order.
    fn open_device(&self, index: usize) -> Result<Device, CaptureError> {
        let host = cpal::default_host();
        let mut devices: Vec<Device> = host.input_devices()?.collect();
        let available = devices.len();

        if index >= available {
            return Err(CaptureError::NoSuchDevice { index, available });
        }

        Ok(devices.swap_remove(index))
    }
}

impl CaptureBackend for CpalBackend {
    fn capture(&self, device_index: usize, sample_rate: u32, buffer: &mut [i16]) -> Result<(), CaptureError> {
        let device = self.open_device(device_index)?;
        info!("Using input device {}: {}", device_index, get_device_name(&device));

        let supported_configs = device.supported_input_configs().map_err(|source| CaptureError::Configs { index: device_index, source })?;
        let config = find_best_config(supported_configs, sample_rate).map_err(|e| CaptureError::NoSupportedConfig {
            index: device_index,
            reason: e.to_string(),
        })?;

        let device_sample_rate = config.sample_rate();
        let channels = config.channels() as usize;
        let sample_format = config.sample_format();

        if device_sample_rate != sample_rate {
            info!(
                "Device {} runs at {} Hz, recording will be resampled to {} Hz",
                device_index, device_sample_rate, sample_rate
            );
        }
        debug!("Device {} capture config: {} Hz, {} channels, {:?}", device_index, device_sample_rate, channels, sample_format);

        // Frames to pull from the device for the same wall-clock duration
        let frames_needed = (buffer.len() as u64 * device_sample_rate as u64).div_ceil(sample_rate as u64) as usize;

        let ring = HeapRb::<f32>::new((device_sample_rate as usize).max(MIN_RING_SIZE));
        let (producer, mut consumer) = ring.split();
        let stream_error = Arc::new(Mutex::new(None));

        let stream_config: StreamConfig = config.config();
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, device_index, &stream_config, channels, producer, stream_error.clone())?,
            SampleFormat::I16 => build_stream::<i16>(&device, device_index, &stream_config, channels, producer, stream_error.clone())?,
            format => return Err(CaptureError::UnsupportedFormat { index: device_index, format }),
        };

        stream.play().map_err(|source| CaptureError::PlayStream { index: device_index, source })?;

        let captured = drain_ring(&mut consumer, frames_needed, device_index, &stream_error, self.quiet_warning)?;

        if let Err(e) = stream.pause() {
            debug!("Failed to pause stream on device {}: {}", device_index, e);
        }
        drop(stream);

        finish_capture(&captured, device_sample_rate, sample_rate, buffer)
    }
}

/// Pull `frames_needed` mono samples out of the ring buffer, blocking until they arrive.
///
/// There is no deadline: a device that goes quiet only produces a warning every
/// `quiet_warning`. Errors reported by the stream end the capture.
fn drain_ring(
    consumer: &mut HeapCons<f32>,
    frames_needed: usize,
    device_index: usize,
    stream_error: &Mutex<Option<String>>,
    quiet_warning: Duration,
) -> Result<Vec<f32>, CaptureError> {
    let mut captured = Vec::with_capacity(frames_needed);
    let mut read_buffer = vec![0.0f32; 4096];
    let mut last_progress = Instant::now();

    while captured.len() < frames_needed {
        if let Some(message) = stream_error.lock().take() {
            return Err(CaptureError::Stream { index: device_index, message });
        }

        let read = consumer.pop_slice(&mut read_buffer);
        if read == 0 {
            if last_progress.elapsed() >= quiet_warning {
                warn!(
                    "Device {} delivered no audio for {:?}, still waiting ({} of {} frames)",
                    device_index,
                    quiet_warning,
                    captured.len(),
                    frames_needed
                );
                last_progress = Instant::now();
            }
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        last_progress = Instant::now();
        let take = read.min(frames_needed - captured.len());
        captured.extend_from_slice(&read_buffer[..take]);
    }

    Ok(captured)
}

/// Convert a finished device-rate capture into exactly `buffer.len()` 16-bit samples at `sample_rate`.
fn finish_capture(captured: &[f32], device_sample_rate: u32, sample_rate: u32, buffer: &mut [i16]) -> Result<(), CaptureError> {
    let samples = resample(captured, device_sample_rate, sample_rate).map_err(|e| CaptureError::Resample(format!("{e:#}")))?;

    if samples.len() < buffer.len() {
        return Err(CaptureError::ShortCapture {
            expected: buffer.len(),
            got: samples.len(),
        });
    }

    for (slot, sample) in buffer.iter_mut().zip(samples) {
        *slot = sample_to_i16(sample);
    }

    Ok(())
}

/// Convert one callback's worth of interleaved device samples to mono f32.
fn to_mono_f32<T>(data: &[T], channels: usize) -> Vec<f32>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let samples: Vec<f32> = data.iter().map(|&s| <f32 as FromSample<T>>::from_sample_(s)).collect();
    convert_to_mono(&samples, channels)
}

/// Build an input stream that down-mixes to mono f32 and feeds the ring buffer.
fn build_stream<T>(
    device: &Device,
    device_index: usize,
    config: &StreamConfig,
    channels: usize,
    mut producer: HeapProd<f32>,
    stream_error: Arc<Mutex<Option<String>>>,
) -> Result<Stream, CaptureError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("Audio capture error on device {}: {}", device_index, err);
        *stream_error.lock() = Some(err.to_string());
    };

    let mut dropped: u64 = 0;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mono = to_mono_f32(data, channels);

                // Push to ring buffer (lock-free, non-blocking)
                let written = producer.push_slice(&mono);
                if written < mono.len() {
                    dropped += 1;
                    if dropped.is_multiple_of(100) || dropped == 1 {
                        warn!("Ring buffer full on device {}, dropped {} audio chunks", device_index, dropped);
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|source| CaptureError::BuildStream { index: device_index, source })
}
