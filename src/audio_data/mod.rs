//! Decoded audio clips and file loading.

mod load_options;
mod resampler;
mod symphonia_loader;

use crate::error::{CueSonicError, Result};
pub use load_options::LoadOptions;
pub use resampler::ClipResampler;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use symphonia_loader::{load_audio_bytes, load_audio_file};

/// Immutable, cheaply clonable block of decoded interleaved samples.
#[derive(Debug, Clone)]
pub struct AudioClip {
    inner: Arc<ClipInner>,
}

#[derive(Debug)]
struct ClipInner {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            inner: Arc::new(ClipInner {
                samples,
                sample_rate,
                channels: channels.max(1),
            }),
        }
    }

    /// Loads a clip from disk, downmixed to mono.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        load_audio_file(path, &LoadOptions::default())
    }

    /// Loads a clip from disk with explicit options.
    pub fn from_path_with_options(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Self> {
        load_audio_file(path, options)
    }

    /// Decodes a clip held in memory, downmixed to mono.
    pub fn from_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<Self> {
        load_audio_bytes(bytes, extension, &LoadOptions::default())
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn total_frames(&self) -> usize {
        self.inner.samples.len() / self.inner.channels as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_frames() as f64 / self.inner.sample_rate.max(1) as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.samples.is_empty()
    }

    pub fn is_mono(&self) -> bool {
        self.inner.channels == 1
    }

    /// Samples of a single channel (0-indexed).
    pub fn channel_samples(&self, channel: usize) -> Result<Vec<f32>> {
        let channels = self.inner.channels as usize;
        if channel >= channels {
            return Err(CueSonicError::AudioFormat(format!(
                "Channel {} out of range (max: {})",
                channel,
                channels - 1
            )));
        }

        Ok(self
            .inner
            .samples
            .chunks(channels)
            .map(|frame| frame[channel])
            .collect())
    }

    /// Averages all channels into one.
    pub fn to_mono(&self) -> Self {
        if self.is_mono() {
            return self.clone();
        }

        let channels = self.inner.channels as usize;
        let mono = self
            .inner
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        Self::new(mono, self.inner.sample_rate, 1)
    }

    /// Resamples every channel to `target_sample_rate` using rubato.
    pub fn resample(&self, target_sample_rate: u32) -> Result<Self> {
        if target_sample_rate == self.inner.sample_rate {
            return Ok(self.clone());
        }

        let resampler = ClipResampler::new(self.inner.sample_rate, target_sample_rate, Some(1024))?;
        let channels = self.inner.channels as usize;

        let resampled = (0..channels)
            .map(|ch| resampler.resample_channel(&self.channel_samples(ch)?))
            .collect::<Result<Vec<_>>>()?;

        let frames = resampled.first().map(Vec::len).unwrap_or(0);
        let mut interleaved = Vec::with_capacity(frames * channels);
        for frame in 0..frames {
            for channel in &resampled {
                interleaved.push(channel[frame]);
            }
        }

        log::debug!(
            "Resampled clip {} Hz -> {} Hz ({} frames)",
            self.inner.sample_rate,
            target_sample_rate,
            frames
        );

        Ok(Self::new(interleaved, target_sample_rate, self.inner.channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mono_averages_channels() {
        let clip = AudioClip::new(vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 48000, 2);
        let mono = clip.to_mono();
        assert_eq!(mono.channels(), 1);
        assert_eq!(mono.samples(), &[0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_channel_samples() {
        let clip = AudioClip::new(vec![1.0, 2.0, 3.0, 4.0], 48000, 2);
        assert_eq!(clip.channel_samples(1).unwrap(), vec![2.0, 4.0]);
        assert!(clip.channel_samples(2).is_err());
    }

    #[test]
    fn test_duration() {
        let clip = AudioClip::new(vec![0.0; 48000], 48000, 1);
        assert_eq!(clip.duration(), Duration::from_secs(1));
        assert_eq!(clip.total_frames(), 48000);
    }

    #[test]
    fn test_resample_keeps_channel_count() {
        let clip = AudioClip::new(vec![0.0; 2 * 1000], 24000, 2);
        let resampled = clip.resample(48000).unwrap();
        assert_eq!(resampled.channels(), 2);
        assert_eq!(resampled.sample_rate(), 48000);
        assert_eq!(resampled.total_frames(), 2000);
    }
}
