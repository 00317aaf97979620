//! Output device for CueSonic

use crate::config::CueSonicDesc;
use crate::error::{CueSonicError, Result};
use crate::mixer::MixerRenderer;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// The single hardware output of the process.
///
/// Opening the device consumes the [`MixerRenderer`], so there can only be one
/// output per mixer. Registering and removing mixer inputs never touches the
/// stream.
pub struct OutputDevice {
    desc: CueSonicDesc,
    stream: Option<cpal::Stream>,
    is_running: Arc<AtomicBool>,
    frames_processed: Arc<AtomicUsize>,
}

impl OutputDevice {
    /// Open the default output device and start pulling from `renderer`.
    pub fn open(desc: CueSonicDesc, renderer: MixerRenderer) -> Result<Self> {
        desc.validate()?;

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            CueSonicError::AudioDevice("No default output device available".into())
        })?;

        if let Ok(name) = device.name() {
            log::info!("Opening output device: {}", name);
        }

        let config = cpal::StreamConfig {
            channels: desc.channels,
            sample_rate: cpal::SampleRate(desc.sample_rate),
            buffer_size: match desc.buffer_size {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };

        let is_running = Arc::new(AtomicBool::new(false));
        let frames_processed = Arc::new(AtomicUsize::new(0));

        let default_config = device.default_output_config().map_err(|e| {
            CueSonicError::AudioDevice(format!("Failed to get default config: {}", e))
        })?;

        let callback = RenderCallback {
            renderer,
            scratch: vec![0.0; desc.pull_frames() * 2],
            channels: desc.channels as usize,
            is_running: is_running.clone(),
            frames_processed: frames_processed.clone(),
        };

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, callback)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, callback)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, callback)?,
            _ => {
                return Err(CueSonicError::AudioFormat(
                    "Unsupported sample format".into(),
                ));
            }
        };

        stream
            .play()
            .map_err(|e| CueSonicError::AudioDevice(format!("Failed to start stream: {}", e)))?;
        is_running.store(true, Ordering::Relaxed);

        log::info!(
            "Output started ({} Hz, {} channels)",
            desc.sample_rate,
            desc.channels
        );

        Ok(Self {
            desc,
            stream: Some(stream),
            is_running,
            frames_processed,
        })
    }

    /// Stop the stream. The renderer and every input it holds are dropped.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.is_running.store(false, Ordering::Relaxed);
            drop(stream);
            log::info!("Output stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Number of device frames rendered since the stream started.
    pub fn frames_processed(&self) -> usize {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn desc(&self) -> &CueSonicDesc {
        &self.desc
    }
}

impl Drop for OutputDevice {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved into the cpal data callback.
struct RenderCallback {
    renderer: MixerRenderer,
    scratch: Vec<f32>,
    channels: usize,
    is_running: Arc<AtomicBool>,
    frames_processed: Arc<AtomicUsize>,
}

impl RenderCallback {
    fn fill<T>(&mut self, data: &mut [T])
    where
        T: SizedSample + FromSample<f32>,
    {
        if !self.is_running.load(Ordering::Relaxed) || self.channels == 0 {
            for sample in data.iter_mut() {
                *sample = T::from_sample(0.0f32);
            }
            return;
        }

        let frames = data.len() / self.channels;
        if self.scratch.len() < frames * 2 {
            log::warn!("Device pulled {} frames, growing callback scratch", frames);
            self.scratch.resize(frames * 2, 0.0);
        }
        let stereo = &mut self.scratch[..frames * 2];
        self.renderer.render(stereo);

        write_device_frames(stereo, data, self.channels);
        self.frames_processed.fetch_add(frames, Ordering::Relaxed);
    }
}

/// Maps interleaved stereo onto `channels` device channels.
///
/// Mono devices get the average; extra channels beyond two are silent.
fn write_device_frames<T>(stereo: &[f32], data: &mut [T], channels: usize)
where
    T: SizedSample + FromSample<f32>,
{
    for (frame, pair) in data.chunks_exact_mut(channels).zip(stereo.chunks_exact(2)) {
        if channels == 1 {
            frame[0] = T::from_sample(0.5 * (pair[0] + pair[1]));
            continue;
        }
        for (c, sample) in frame.iter_mut().enumerate() {
            let value = match c {
                0 => pair[0],
                1 => pair[1],
                _ => 0.0,
            };
            *sample = T::from_sample(value);
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut callback: RenderCallback,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| callback.fill(data),
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| CueSonicError::AudioDevice(format!("Failed to build stream: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_passes_through() {
        let stereo = [0.1, 0.2, 0.3, 0.4];
        let mut data = [0.0f32; 4];
        write_device_frames(&stereo, &mut data, 2);
        assert_eq!(data, stereo);
    }

    #[test]
    fn test_mono_device_averages() {
        let stereo = [0.2, 0.4, -1.0, 1.0];
        let mut data = [9.0f32; 2];
        write_device_frames(&stereo, &mut data, 1);
        assert!((data[0] - 0.3).abs() < 1e-6);
        assert_eq!(data[1], 0.0);
    }

    #[test]
    fn test_extra_channels_are_silent() {
        let stereo = [0.5, -0.5];
        let mut data = [9.0f32; 4];
        write_device_frames(&stereo, &mut data, 4);
        assert_eq!(data, [0.5, -0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_integer_formats_convert() {
        let stereo = [0.0, 0.5];
        let mut data = [7i16; 2];
        write_device_frames(&stereo, &mut data, 2);
        assert_eq!(data[0], 0);
        assert!(data[1] > 16000);
    }
}
