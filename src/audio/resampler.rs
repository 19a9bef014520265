//! Audio resampling using rubato's FFT-based resampler.
//!
//! Captures run at whatever rate the device supports; this converts the finished
//! buffer to the rate requested for the WAV file, keeping it aligned in time.

use anyhow::{Context, Result};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{Fft, FixedSync, Resampler};

/// Chunk size for FFT-based resampling (provides good quality and performance).
const CHUNK_SIZE: usize = 1024;

/// Number of sub-chunks for FFT processing (higher = better quality but more CPU).
const SUB_CHUNKS: usize = 2;

/// Number of output frames `input_len` frames become at the new rate.
pub fn resampled_len(input_len: usize, from_rate: u32, to_rate: u32) -> usize {
    (input_len as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize
}

/// Resample a complete mono recording from one sample rate to another.
///
/// The resampler's filter delay is removed from the front and the tail is
/// flushed with silence, so output frame `n` lines up with input time
/// `n / to_rate` and the result holds exactly [`resampled_len`] frames.
///
/// # Arguments
/// * `samples` - Input audio samples
/// * `from_rate` - Device sample rate (e.g., 48000)
/// * `to_rate` - Requested output sample rate (e.g., 44100)
///
/// # Returns
/// Resampled audio samples at the target rate
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    // No resampling needed if rates match
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let mut resampler = Fft::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        1, // mono
        FixedSync::Input,
    )
    .context("Failed to create resampler")?;

    let expected_len = resampled_len(samples.len(), from_rate, to_rate);
    let delay = resampler.output_delay();
    let output_frames_max = resampler.output_frames_max();
    let mut output_buffer = vec![0.0f32; output_frames_max];
    let mut output = Vec::with_capacity(expected_len + delay + output_frames_max);
    let mut pos = 0;

    // Keep feeding input (zero-padded past the end) until the delayed tail has come out
    while output.len() < expected_len + delay {
        let chunk_size = resampler.input_frames_next();
        let mut input_chunk = vec![0.0f32; chunk_size];
        if pos < samples.len() {
            let end = (pos + chunk_size).min(samples.len());
            input_chunk[..end - pos].copy_from_slice(&samples[pos..end]);
        }
        pos += chunk_size;

        let input_adapter = InterleavedSlice::new(&input_chunk, 1, chunk_size).context("Failed to create input adapter")?;
        let mut output_adapter = InterleavedSlice::new_mut(&mut output_buffer, 1, output_frames_max).context("Failed to create output adapter")?;

        let (_, frames_written) = resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, None)
            .map_err(|e| anyhow::anyhow!("Resampling error: {}", e))?;

        if frames_written == 0 && pos > samples.len() + 4 * CHUNK_SIZE {
            anyhow::bail!("Resampler stopped producing output");
        }
        output.extend_from_slice(&output_buffer[..frames_written]);
    }

    output.drain(..delay);
    output.truncate(expected_len);
    Ok(output)
}
