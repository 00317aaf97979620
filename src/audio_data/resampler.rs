use crate::error::{CueSonicError, Result};
use rubato::{FftFixedIn, Resampler};

/// Offline resampler used when a clip's rate differs from the pipeline rate.
///
/// Runs at load time on the calling thread; nothing here is real-time safe.
pub struct ClipResampler {
    source_sample_rate: u32,
    target_sample_rate: u32,
    chunk_size: usize,
}

impl ClipResampler {
    pub fn new(source_sample_rate: u32, target_sample_rate: u32, chunk_size: Option<usize>) -> Result<Self> {
        if source_sample_rate == 0 || target_sample_rate == 0 {
            return Err(CueSonicError::AudioFormat(
                "Sample rates must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            source_sample_rate,
            target_sample_rate,
            chunk_size: chunk_size.unwrap_or(1024),
        })
    }

    /// Number of output samples that correspond to `input_len` input samples.
    pub fn output_len(&self, input_len: usize) -> usize {
        ((input_len as u64 * self.target_sample_rate as u64).div_ceil(self.source_sample_rate as u64))
            as usize
    }

    /// Resamples one channel. The trailing partial chunk is zero-padded and the
    /// result trimmed back to the expected length.
    pub fn resample_channel(&self, channel_samples: &[f32]) -> Result<Vec<f32>> {
        if self.source_sample_rate == self.target_sample_rate {
            return Ok(channel_samples.to_vec());
        }

        let mut resampler = FftFixedIn::<f32>::new(
            self.source_sample_rate as usize,
            self.target_sample_rate as usize,
            self.chunk_size,
            2,
            1,
        )
        .map_err(|e| CueSonicError::AudioLoading(format!("Failed to create resampler: {}", e)))?;

        let expected = self.output_len(channel_samples.len());
        let mut output = Vec::with_capacity(expected + self.chunk_size * 2);
        let mut chunk = vec![0.0f32; self.chunk_size];

        for block in channel_samples.chunks(self.chunk_size) {
            chunk[..block.len()].copy_from_slice(block);
            chunk[block.len()..].fill(0.0);

            let waves_out = resampler
                .process(&[chunk.as_slice()], None)
                .map_err(|e| CueSonicError::AudioLoading(format!("Resampling error: {}", e)))?;

            if let Some(first) = waves_out.first() {
                output.extend_from_slice(first);
            }
        }

        output.resize(expected, 0.0);
        Ok(output)
    }

    pub fn source_sample_rate(&self) -> u32 {
        self.source_sample_rate
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    pub fn resample_ratio(&self) -> f64 {
        self.target_sample_rate as f64 / self.source_sample_rate as f64
    }
}
