use super::MonoSource;
use crate::audio_data::AudioClip;
use crate::error::{CueSonicError, Result};

/// Loop mode for file-backed sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Play once; `read` comes up short at the end of the clip
    #[default]
    Once,
    /// Loop forever with a crossfaded seam
    Infinite,
}

/// Mono reader over a decoded clip.
///
/// In [`LoopMode::Infinite`] the clip is cut `crossfade` samples short and its
/// tail is blended into the head, so the wrap from the last sample back to the
/// first is continuous. The first pass plays the untouched head.
pub struct ClipSource {
    clip: AudioClip,
    loop_body: Vec<f32>,
    period: usize,
    cursor: usize,
    first_pass: bool,
    loop_mode: LoopMode,
}

impl ClipSource {
    /// Wraps `clip` for a pipeline running at `sample_rate`, downmixing it to
    /// mono and resampling it if needed. `crossfade` is in output samples.
    pub fn new(
        clip: &AudioClip,
        loop_mode: LoopMode,
        crossfade: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if clip.is_empty() {
            return Err(CueSonicError::AudioFormat(
                "Cannot play an empty clip".to_string(),
            ));
        }
        let clip = clip.to_mono().resample(sample_rate)?;

        let (loop_body, period) = match loop_mode {
            LoopMode::Once => (Vec::new(), clip.samples().len()),
            LoopMode::Infinite => build_loop_body(clip.samples(), crossfade),
        };

        Ok(Self {
            clip,
            loop_body,
            period,
            cursor: 0,
            first_pass: true,
            loop_mode,
        })
    }

    pub fn looping(clip: &AudioClip, crossfade: usize, sample_rate: u32) -> Result<Self> {
        Self::new(clip, LoopMode::Infinite, crossfade, sample_rate)
    }

    pub fn once(clip: &AudioClip, sample_rate: u32) -> Result<Self> {
        Self::new(clip, LoopMode::Once, 0, sample_rate)
    }

    /// Rate of the samples this source produces.
    pub fn sample_rate(&self) -> u32 {
        self.clip.sample_rate()
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    /// Length of one loop iteration in samples.
    pub fn period(&self) -> usize {
        self.period
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.first_pass = true;
    }

    pub fn is_finished(&self) -> bool {
        self.loop_mode == LoopMode::Once && self.cursor >= self.period
    }
}

fn build_loop_body(samples: &[f32], crossfade: usize) -> (Vec<f32>, usize) {
    let len = samples.len();
    let fade = crossfade.min(len / 2);
    if fade == 0 {
        return (samples.to_vec(), len);
    }

    let period = len - fade;
    let mut body = samples[..period].to_vec();
    for (i, sample) in body.iter_mut().take(fade).enumerate() {
        let t = i as f32 / fade as f32;
        *sample = samples[i] * t + samples[period + i] * (1.0 - t);
    }
    (body, period)
}

impl MonoSource for ClipSource {
    fn read(&mut self, out: &mut [f32]) -> usize {
        match self.loop_mode {
            LoopMode::Once => {
                let remaining = self.period - self.cursor;
                let n = remaining.min(out.len());
                out[..n].copy_from_slice(&self.clip.samples()[self.cursor..self.cursor + n]);
                self.cursor += n;
                n
            }
            LoopMode::Infinite => {
                let mut written = 0;
                while written < out.len() {
                    let src = if self.first_pass {
                        &self.clip.samples()[..self.period]
                    } else {
                        &self.loop_body[..]
                    };
                    let n = (out.len() - written).min(self.period - self.cursor);
                    out[written..written + n]
                        .copy_from_slice(&src[self.cursor..self.cursor + n]);
                    written += n;
                    self.cursor += n;
                    if self.cursor >= self.period {
                        self.cursor = 0;
                        self.first_pass = false;
                    }
                }
                written
            }
        }
    }

    fn is_continuous(&self) -> bool {
        self.loop_mode == LoopMode::Infinite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    const SR: u32 = 48000;

    fn sine_clip(len: usize) -> AudioClip {
        let samples = (0..len)
            .map(|i| (TAU * 440.0 * i as f32 / 48000.0).sin())
            .collect();
        AudioClip::new(samples, 48000, 1)
    }

    fn max_step(samples: &[f32]) -> f32 {
        samples
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0, f32::max)
    }

    #[test]
    fn test_once_returns_short_at_end() {
        let clip = AudioClip::new(vec![0.5; 100], 48000, 1);
        let mut source = ClipSource::once(&clip, SR).unwrap();
        let mut buf = vec![0.0; 64];
        assert_eq!(source.read(&mut buf), 64);
        assert_eq!(source.read(&mut buf), 36);
        assert_eq!(source.read(&mut buf), 0);
        assert!(source.is_finished());
        assert!(!source.is_continuous());
    }

    #[test]
    fn test_infinite_always_fills() {
        let clip = sine_clip(1000);
        let mut source = ClipSource::looping(&clip, 100, SR).unwrap();
        let mut buf = vec![0.0; 777];
        for _ in 0..20 {
            assert_eq!(source.read(&mut buf), 777);
        }
    }

    #[test]
    fn test_first_pass_plays_head_untouched() {
        let clip = sine_clip(1000);
        let mut source = ClipSource::looping(&clip, 100, SR).unwrap();
        let mut buf = vec![0.0; source.period()];
        source.read(&mut buf);
        assert_eq!(&buf[..], &clip.samples()[..900]);
    }

    #[test]
    fn test_hard_loop_clicks_crossfaded_loop_does_not() {
        let clip = sine_clip(1000);

        let mut hard = ClipSource::looping(&clip, 0, SR).unwrap();
        let mut buf = vec![0.0; 3500];
        hard.read(&mut buf);
        assert!(max_step(&buf) > 0.5);

        let mut smooth = ClipSource::looping(&clip, 480, SR).unwrap();
        smooth.read(&mut buf);
        assert!(max_step(&buf) < 0.07);
    }

    #[test]
    fn test_stereo_clip_is_downmixed() {
        let clip = AudioClip::new(vec![1.0, 0.0, 1.0, 0.0], 48000, 2);
        let mut source = ClipSource::once(&clip, SR).unwrap();
        let mut buf = vec![0.0; 4];
        assert_eq!(source.read(&mut buf), 2);
        assert_eq!(&buf[..2], &[0.5, 0.5]);
    }

    #[test]
    fn test_empty_clip_rejected() {
        let clip = AudioClip::new(Vec::new(), 48000, 1);
        assert!(ClipSource::looping(&clip, 10, SR).is_err());
    }

    #[test]
    fn test_clip_is_resampled_to_pipeline_rate() {
        let samples = (0..44100)
            .map(|i| (TAU * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        let clip = AudioClip::new(samples, 44100, 1);
        let mut source = ClipSource::once(&clip, SR).unwrap();
        assert_eq!(source.sample_rate(), SR);

        // One second of audio stays one second long at the new rate.
        let mut total = 0;
        let mut buf = vec![0.0; 1000];
        loop {
            let n = source.read(&mut buf);
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(total, 48000);
    }
}
