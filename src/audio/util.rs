//! Shared audio utilities for capture and WAV output.

use anyhow::Result;
use cpal::traits::DeviceTrait;
use cpal::{Device, SampleFormat, SupportedStreamConfig, SupportedStreamConfigRange};

/// Get a human-readable device name.
///
/// # Arguments
/// * `device` - The audio device
///
/// # Returns
/// Device name string, or "Unknown" if the name cannot be retrieved.
pub fn get_device_name(device: &Device) -> String {
    device.description().ok().map(|desc| desc.name().to_string()).unwrap_or_else(|| "Unknown".to_string())
}

/// Find the best matching capture configuration.
///
/// Searches for a configuration that:
/// 1. Supports mono or stereo (max 2 channels)
/// 2. Uses F32 samples, or I16 when the device offers no F32 format
/// 3. Matches the target sample rate, or uses the closest available rate
///
/// # Arguments
/// * `configs` - Iterator of supported stream configurations
/// * `target_sample_rate` - Desired sample rate of the recording
///
/// # Returns
/// The best matching `SupportedStreamConfig`, or an error if no suitable config found.
pub fn find_best_config(configs: impl Iterator<Item = SupportedStreamConfigRange>, target_sample_rate: u32) -> Result<SupportedStreamConfig> {
    let mut f32_configs: Vec<SupportedStreamConfigRange> = Vec::new();
    let mut i16_configs: Vec<SupportedStreamConfigRange> = Vec::new();

    for config in configs {
        // Only consider mono or stereo
        if config.channels() > 2 {
            continue;
        }

        match config.sample_format() {
            SampleFormat::F32 => f32_configs.push(config),
            SampleFormat::I16 => i16_configs.push(config),
            _ => {}
        }
    }

    let candidates = if f32_configs.is_empty() { i16_configs } else { f32_configs };
    if candidates.is_empty() {
        anyhow::bail!("No F32 or I16 mono/stereo capture configuration available");
    }

    // Find config that supports target sample rate
    for config in &candidates {
        if target_sample_rate >= config.min_sample_rate() && target_sample_rate <= config.max_sample_rate() {
            return Ok((*config).with_sample_rate(target_sample_rate));
        }
    }

    // Otherwise take the config whose range comes closest to the target
    let distance = |config: &SupportedStreamConfigRange| {
        if target_sample_rate < config.min_sample_rate() {
            config.min_sample_rate() - target_sample_rate
        } else {
            target_sample_rate - config.max_sample_rate()
        }
    };
    let config = candidates.iter().min_by_key(|config| distance(*config)).unwrap_or(&candidates[0]);
    let rate = if target_sample_rate < config.min_sample_rate() {
        config.min_sample_rate()
    } else {
        config.max_sample_rate()
    };
    Ok((*config).with_sample_rate(rate))
}

/// Convert interleaved f32 samples to mono f32 samples.
///
/// Handles both mono and stereo input:
/// - Mono: Returns a copy of the input
/// - Stereo: Mixes channels by averaging
///
/// # Arguments
/// * `data` - Raw f32 samples (interleaved for stereo)
/// * `channels` - Number of channels (1 for mono, 2 for stereo)
///
/// # Returns
/// Vector of mono f32 samples
pub fn convert_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        data.to_vec()
    } else {
        data.chunks(channels).map(|frame| frame.iter().sum::<f32>() / channels as f32).collect()
    }
}

/// Convert an f32 sample in [-1, 1] to 16-bit PCM, clamping out-of-range input.
pub fn sample_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::SupportedBufferSize;

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(channels, min, max, SupportedBufferSize::Unknown, format)
    }

    #[test]
    fn test_stereo_to_mono() {
        let data = vec![0.5f32, 1.0, -0.5, -1.0];
        let result = convert_to_mono(&data, 2);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], 0.75); // (0.5 + 1.0) / 2
        assert_eq!(result[1], -0.75); // (-0.5 + -1.0) / 2
    }

    #[test]
    fn test_mono_passthrough() {
        let data = vec![0.1f32, 0.2, 0.3];
        assert_eq!(convert_to_mono(&data, 1), data);
    }

    #[test]
    fn test_sample_to_i16() {
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(sample_to_i16(1.0), i16::MAX);
        assert_eq!(sample_to_i16(-1.0), -i16::MAX);

        // Clamping
        assert_eq!(sample_to_i16(2.0), i16::MAX);
        assert_eq!(sample_to_i16(-2.0), -i16::MAX);
    }

    #[test]
    fn test_find_best_config_prefers_exact_rate() {
        let configs = vec![range(2, 8000, 96000, SampleFormat::F32), range(6, 8000, 96000, SampleFormat::F32)];
        let config = find_best_config(configs.into_iter(), 44100).unwrap();
        assert_eq!(config.sample_rate(), 44100);
        assert_eq!(config.channels(), 2);
    }

    #[test]
    fn test_find_best_config_falls_back_to_i16() {
        let configs = vec![range(1, 44100, 48000, SampleFormat::I16), range(1, 44100, 48000, SampleFormat::U8)];
        let config = find_best_config(configs.into_iter(), 44100).unwrap();
        assert_eq!(config.sample_format(), SampleFormat::I16);
    }

    #[test]
    fn test_find_best_config_closest_rate() {
        let configs = vec![range(1, 8000, 16000, SampleFormat::F32), range(1, 48000, 48000, SampleFormat::F32)];
        let config = find_best_config(configs.into_iter(), 44100).unwrap();
        assert_eq!(config.sample_rate(), 48000);
    }

    #[test]
    fn test_find_best_config_none_usable() {
        let configs = vec![range(8, 44100, 44100, SampleFormat::F32)];
        assert!(find_best_config(configs.into_iter(), 44100).is_err());
    }
}
