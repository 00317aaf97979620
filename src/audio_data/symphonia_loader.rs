use crate::{
    audio_data::{AudioClip, LoadOptions},
    error::{CueSonicError, Result},
};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use symphonia::{
    core::{
        audio::SampleBuffer,
        codecs::DecoderOptions,
        errors::Error,
        formats::FormatOptions,
        io::{MediaSource, MediaSourceStream},
        meta::MetadataOptions,
        probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// Decodes an audio file from disk.
pub fn load_audio_file(path: impl AsRef<Path>, options: &LoadOptions) -> Result<AudioClip> {
    let path = path.as_ref();
    let file = File::open(path)?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    log::debug!("Decoding audio file {}", path.display());
    decode(Box::new(file), hint, options)
}

/// Decodes an in-memory audio file (for example an embedded asset).
pub fn load_audio_bytes(
    bytes: Vec<u8>,
    extension: Option<&str>,
    options: &LoadOptions,
) -> Result<AudioClip> {
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }
    decode(Box::new(Cursor::new(bytes)), hint, options)
}

fn decode(source: Box<dyn MediaSource>, hint: Hint, options: &LoadOptions) -> Result<AudioClip> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| CueSonicError::AudioLoading(format!("Failed to probe audio format: {:?}", e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| CueSonicError::AudioLoading("No default audio track found".to_string()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| CueSonicError::AudioLoading("Sample rate not found".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| CueSonicError::AudioLoading("Channel count not found".to_string()))?
        .count();

    if let Some(ch) = options.mono_channel {
        if ch >= channels {
            return Err(CueSonicError::AudioFormat(format!(
                "Channel {} out of range (max: {})",
                ch,
                channels - 1
            )));
        }
    }

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| CueSonicError::AudioLoading(format!("Failed to create decoder: {:?}", e)))?;

    let max_frames = options
        .max_duration
        .map(|d| (d.as_secs_f64() * sample_rate as f64) as usize)
        .unwrap_or(usize::MAX);

    let kept_channels = if options.mono_channel.is_some() { 1 } else { channels };
    let mut samples: Vec<f32> = Vec::new();
    let mut frames_decoded = 0;

    while frames_decoded < max_frames {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break,
            Err(e) => {
                return Err(CueSonicError::AudioLoading(format!(
                    "Error reading packet: {:?}",
                    e
                )));
            }
        };

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::IoError(_)) => break,
            // Corrupt packet, skip it
            Err(Error::DecodeError(_)) => continue,
            Err(e) => {
                return Err(CueSonicError::AudioLoading(format!(
                    "Error decoding packet: {:?}",
                    e
                )));
            }
        };

        let spec = *decoded.spec();
        let frames = decoded.frames();
        let mut tmp = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        tmp.copy_interleaved_ref(decoded);

        match options.mono_channel {
            Some(ch) => samples.extend(tmp.samples().chunks(channels).map(|frame| frame[ch])),
            None => samples.extend_from_slice(tmp.samples()),
        }

        frames_decoded += frames;
    }

    if frames_decoded > max_frames {
        samples.truncate(max_frames * kept_channels);
    }

    let mut clip = AudioClip::new(samples, sample_rate, kept_channels as u16);

    if options.convert_to_mono {
        clip = clip.to_mono();
    }

    if let Some(target_rate) = options.target_sample_rate {
        clip = clip.resample(target_rate)?;
    }

    log::debug!(
        "Decoded clip: {} frames, {} channel(s), {} Hz",
        clip.total_frames(),
        clip.channels(),
        clip.sample_rate()
    );

    Ok(clip)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a 16-bit PCM WAV file in memory.
    fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let block_align = channels * 2;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_stereo_wav_is_downmixed() {
        // Left at half scale, right silent: the mono mix sits at a quarter.
        let frames = 256;
        let mut samples = Vec::new();
        for _ in 0..frames {
            samples.push(16384i16);
            samples.push(0i16);
        }
        let bytes = wav_bytes(48000, 2, &samples);

        let clip = load_audio_bytes(bytes, Some("wav"), &LoadOptions::default()).unwrap();
        assert_eq!(clip.channels(), 1);
        assert_eq!(clip.sample_rate(), 48000);
        assert_eq!(clip.total_frames(), frames);
        for s in clip.samples() {
            assert!((s - 0.25).abs() < 1e-3);
        }
    }

    #[test]
    fn test_single_channel_extraction() {
        let mut samples = Vec::new();
        for _ in 0..64 {
            samples.push(0i16);
            samples.push(-16384i16);
        }
        let bytes = wav_bytes(44100, 2, &samples);

        let options = LoadOptions::new().mono_channel(1);
        let clip = load_audio_bytes(bytes, Some("wav"), &options).unwrap();
        assert_eq!(clip.channels(), 1);
        assert!(clip.samples().iter().all(|s| (s + 0.5).abs() < 1e-3));
    }

    #[test]
    fn test_channel_out_of_range() {
        let bytes = wav_bytes(44100, 1, &[0i16; 32]);
        let options = LoadOptions::new().mono_channel(3);
        assert!(load_audio_bytes(bytes, Some("wav"), &options).is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = load_audio_file("does/not/exist.wav", &LoadOptions::default());
        assert!(matches!(result, Err(CueSonicError::Io(_))));
    }
}
