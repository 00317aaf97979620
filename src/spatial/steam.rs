//! Steam Audio (audionimbus) implementation of the native HRTF boundary.

use super::native::{
    BinauralKernel, BinauralParams, DirectKernel, HrtfEngine, Interpolation, NativeError,
    NativeResult,
};
use crate::occlusion::DirectParams;
use audionimbus::{
    AudioBufferSettings, AudioSettings, BinauralEffect, BinauralEffectParams,
    BinauralEffectSettings, Context, ContextSettings, DirectEffect, DirectEffectParams,
    DirectEffectSettings, Direction, Equalizer, Hrtf, HrtfInterpolation, HrtfSettings, Sofa,
    Transmission, VolumeNormalization, audio_buffer::AudioBuffer as NimbusAudioBuffer,
};
use std::sync::Arc;

struct SteamShared {
    // Field order is release order: HRTF before the context that owns it.
    hrtf: Hrtf,
    context: Context,
    sample_rate: u32,
    frame_size: usize,
}

impl SteamShared {
    fn audio_settings(&self) -> AudioSettings {
        AudioSettings {
            sampling_rate: self.sample_rate,
            frame_size: self.frame_size as u32,
        }
    }
}

/// Steam Audio context plus the HRTF every binaural effect convolves with.
pub struct SteamHrtfEngine {
    shared: Arc<SteamShared>,
}

impl SteamHrtfEngine {
    /// Creates the Steam Audio context and loads the HRTF.
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate for audio processing
    /// * `frame_size` - Number of frames processed per apply call
    /// * `hrtf_path` - Optional SOFA file (None uses Steam Audio's default HRTF)
    pub fn new(sample_rate: u32, frame_size: usize, hrtf_path: Option<&str>) -> NativeResult<Self> {
        log::info!(
            "Initializing Steam Audio HRTF engine (sample_rate: {} Hz, frame_size: {})",
            sample_rate,
            frame_size
        );

        let context = Context::try_new(&ContextSettings::default())
            .map_err(|e| NativeError::ContextCreation(e.to_string()))?;

        let audio_settings = AudioSettings {
            sampling_rate: sample_rate,
            frame_size: frame_size as u32,
        };

        let sofa_information = match hrtf_path {
            Some(path) => {
                let data = std::fs::read(path).map_err(|e| {
                    NativeError::HrtfCreation(format!("failed to read {}: {}", path, e))
                })?;
                Some(Sofa::Buffer(data))
            }
            None => None,
        };

        let hrtf = Hrtf::try_new(
            &context,
            &audio_settings,
            &HrtfSettings {
                volume_normalization: VolumeNormalization::None,
                sofa_information,
                ..Default::default()
            },
        )
        .map_err(|e| NativeError::HrtfCreation(e.to_string()))?;

        match hrtf_path {
            Some(path) => log::info!("Created HRTF from file: {}", path),
            None => log::info!("Created default HRTF"),
        }

        Ok(Self {
            shared: Arc::new(SteamShared {
                hrtf,
                context,
                sample_rate,
                frame_size,
            }),
        })
    }
}

impl HrtfEngine for SteamHrtfEngine {
    fn frame_size(&self) -> usize {
        self.shared.frame_size
    }

    fn create_kernel(&self) -> NativeResult<Box<dyn BinauralKernel>> {
        let effect = BinauralEffect::try_new(
            &self.shared.context,
            &self.shared.audio_settings(),
            &BinauralEffectSettings {
                hrtf: &self.shared.hrtf,
            },
        )
        .map_err(|e| NativeError::EffectCreation(e.to_string()))?;

        log::debug!("Created binaural effect");

        Ok(Box::new(SteamBinauralKernel {
            effect,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn create_direct_kernel(&self) -> NativeResult<Box<dyn DirectKernel>> {
        let effect = DirectEffect::try_new(
            &self.shared.context,
            &self.shared.audio_settings(),
            &DirectEffectSettings { num_channels: 1 },
        )
        .map_err(|e| NativeError::EffectCreation(format!("direct effect: {}", e)))?;

        log::debug!("Created direct effect");

        Ok(Box::new(SteamDirectKernel {
            effect,
            shared: Arc::clone(&self.shared),
        }))
    }
}

fn mono_settings() -> AudioBufferSettings {
    AudioBufferSettings {
        num_channels: Some(1),
        ..Default::default()
    }
}

struct SteamBinauralKernel {
    // Released before the shared context.
    effect: BinauralEffect,
    shared: Arc<SteamShared>,
}

impl BinauralKernel for SteamBinauralKernel {
    fn apply(
        &mut self,
        params: &BinauralParams,
        input: &[f32],
        output: &mut [f32],
    ) -> NativeResult<()> {
        let n = self.shared.frame_size;
        if input.len() != n || output.len() != n * 2 {
            return Err(NativeError::FrameSize {
                expected: n,
                actual: input.len(),
            });
        }

        let input_buf = NimbusAudioBuffer::try_with_data_and_settings(input, mono_settings())
            .map_err(|e| NativeError::Apply(format!("input buffer: {}", e)))?;

        let output_buf = NimbusAudioBuffer::try_with_data_and_settings(
            &mut *output,
            AudioBufferSettings {
                num_channels: Some(2),
                ..Default::default()
            },
        )
        .map_err(|e| NativeError::Apply(format!("output buffer: {}", e)))?;

        let effect_params = BinauralEffectParams {
            direction: Direction::new(params.direction.x, params.direction.y, params.direction.z),
            interpolation: match params.interpolation {
                Interpolation::Nearest => HrtfInterpolation::Nearest,
                Interpolation::Bilinear => HrtfInterpolation::Bilinear,
            },
            spatial_blend: params.spatial_blend,
            hrtf: &self.shared.hrtf,
            peak_delays: None,
        };

        self.effect.apply(&effect_params, &input_buf, &output_buf);
        Ok(())
    }
}

struct SteamDirectKernel {
    // Released before the shared context.
    effect: DirectEffect,
    shared: Arc<SteamShared>,
}

impl DirectKernel for SteamDirectKernel {
    fn apply(
        &mut self,
        params: &DirectParams,
        input: &[f32],
        output: &mut [f32],
    ) -> NativeResult<()> {
        let n = self.shared.frame_size;
        if input.len() != n || output.len() != n {
            return Err(NativeError::FrameSize {
                expected: n,
                actual: input.len(),
            });
        }

        let input_buf = NimbusAudioBuffer::try_with_data_and_settings(input, mono_settings())
            .map_err(|e| NativeError::Apply(format!("input buffer: {}", e)))?;
        let output_buf = NimbusAudioBuffer::try_with_data_and_settings(&mut *output, mono_settings())
            .map_err(|e| NativeError::Apply(format!("output buffer: {}", e)))?;

        // Distance is handled by the emitter volume, so only occlusion and
        // transmission are set here.
        let effect_params = DirectEffectParams {
            distance_attenuation: None,
            air_absorption: None,
            directivity: None,
            occlusion: Some(params.attenuation.clamp(0.0, 1.0)),
            transmission: Some(Transmission::FrequencyDependent(Equalizer(
                params.transmission.map(|t| t.clamp(0.0, 1.0)),
            ))),
        };

        self.effect.apply(&effect_params, &input_buf, &output_buf);
        Ok(())
    }
}
