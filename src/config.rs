//! Configuration for CueSonic

use crate::error::{CueSonicError, Result};
use crate::spatial::Interpolation;
use std::time::Duration;

/// Process-wide audio configuration.
///
/// Built once at startup and handed to [`AudioContext`](crate::AudioContext),
/// the [`Mixer`](crate::Mixer) and the [`OutputDevice`](crate::OutputDevice).
/// `frame_size` is the fixed DSP frame shared by every spatializer in the process.
#[derive(Debug, Clone)]
pub struct CueSonicDesc {
    /// Sample rate of the whole pipeline
    pub sample_rate: u32,
    /// Number of mono frames the HRTF stage processes per call
    pub frame_size: usize,
    /// Number of device output channels (the pipeline itself is stereo)
    pub channels: u16,
    /// Fixed device buffer size in frames (None = let the device decide)
    pub buffer_size: Option<u32>,
    /// Expected upper bound on simultaneously registered mixer inputs
    pub max_emitters: usize,
    /// Try to bring up the HRTF engine; when false every emitter pans instead
    pub enable_hrtf: bool,
    /// Optional path to a custom HRTF SOFA file (None uses Steam Audio's default HRTF)
    pub hrtf_path: Option<String>,
    /// Crossfade length used when looping file-backed sources
    pub loop_crossfade: Duration,
    /// HRTF interpolation mode
    pub interpolation: Interpolation,
}

impl Default for CueSonicDesc {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            frame_size: 512,
            channels: 2,
            buffer_size: None,
            max_emitters: 64,
            enable_hrtf: true,
            hrtf_path: None,
            loop_crossfade: Duration::from_millis(10),
            interpolation: Interpolation::Bilinear,
        }
    }
}

impl CueSonicDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn frame_size(mut self, size: usize) -> Self {
        self.frame_size = size;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn buffer_size(mut self, frames: u32) -> Self {
        self.buffer_size = Some(frames);
        self
    }

    pub fn max_emitters(mut self, max: usize) -> Self {
        self.max_emitters = max;
        self
    }

    pub fn enable_hrtf(mut self, enable: bool) -> Self {
        self.enable_hrtf = enable;
        self
    }

    pub fn hrtf_path(mut self, path: impl Into<String>) -> Self {
        self.hrtf_path = Some(path.into());
        self
    }

    pub fn loop_crossfade(mut self, crossfade: Duration) -> Self {
        self.loop_crossfade = crossfade;
        self
    }

    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Crossfade length in samples at the configured sample rate.
    pub fn loop_crossfade_samples(&self) -> usize {
        (self.loop_crossfade.as_secs_f64() * self.sample_rate as f64).round() as usize
    }

    /// Largest pull, in frames, the output callback is expected to make.
    ///
    /// Both the device callback and the mixer size their scratch from this,
    /// so a pull of this size never allocates on the audio thread.
    pub fn pull_frames(&self) -> usize {
        self.buffer_size
            .map(|frames| frames as usize)
            .unwrap_or(self.frame_size * 4)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(CueSonicError::Configuration(
                "Sample rate must be greater than 0".to_string(),
            ));
        }
        if self.frame_size == 0 {
            return Err(CueSonicError::Configuration(
                "Frame size must be greater than 0".to_string(),
            ));
        }
        if self.channels == 0 {
            return Err(CueSonicError::Configuration(
                "Channel count must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Distance attenuation parameters.
///
/// These come from the game-side configuration surface and are passed into
/// [`Emitter::update`](crate::Emitter::update) every tick rather than read internally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttenuationParams {
    /// Distance at which the volume reaches `min_volume`
    pub max_range: f32,
    /// Volume floor at and beyond `max_range`
    pub min_volume: f32,
    /// Volume for emitters at or inside `near_threshold`
    pub max_volume: f32,
    /// Below this distance the emitter is treated as coincident with the listener
    pub near_threshold: f32,
}

impl Default for AttenuationParams {
    fn default() -> Self {
        Self {
            max_range: 50.0,
            min_volume: 0.01,
            max_volume: 0.16,
            near_threshold: 1.0,
        }
    }
}

impl AttenuationParams {
    pub fn new(max_range: f32, min_volume: f32, max_volume: f32) -> Self {
        Self {
            max_range,
            min_volume,
            max_volume,
            ..Default::default()
        }
    }

    pub fn near_threshold(mut self, threshold: f32) -> Self {
        self.near_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_desc_is_valid() {
        assert!(CueSonicDesc::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_desc() {
        assert!(CueSonicDesc::new().sample_rate(0).validate().is_err());
        assert!(CueSonicDesc::new().frame_size(0).validate().is_err());
        assert!(CueSonicDesc::new().channels(0).validate().is_err());
    }

    #[test]
    fn test_crossfade_samples() {
        let desc = CueSonicDesc::new()
            .sample_rate(48000)
            .loop_crossfade(Duration::from_millis(10));
        assert_eq!(desc.loop_crossfade_samples(), 480);
    }

    #[test]
    fn test_pull_frames() {
        assert_eq!(CueSonicDesc::new().frame_size(256).pull_frames(), 1024);
        assert_eq!(CueSonicDesc::new().buffer_size(300).pull_frames(), 300);
    }
}
