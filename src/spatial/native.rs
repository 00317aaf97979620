//! Boundary between the pipeline and the native HRTF engine.
//!
//! Every native call returns a [`NativeResult`]. Callers turn errors into
//! silence; nothing on this boundary panics.

use crate::math::Vec3;
use crate::occlusion::DirectParams;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NativeError {
    #[error("failed to create native context: {0}")]
    ContextCreation(String),

    #[error("failed to create HRTF: {0}")]
    HrtfCreation(String),

    #[error("failed to create native effect: {0}")]
    EffectCreation(String),

    #[error("failed to allocate a {len}-sample DSP buffer")]
    BufferAllocation { len: usize },

    #[error("frame size mismatch: expected {expected} samples, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("native apply failed: {0}")]
    Apply(String),
}

pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// How the HRTF is sampled between measured directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
}

/// Per-frame parameters for one binaural apply call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinauralParams {
    /// Listener-local direction, `-Z` forward; need not be unit length
    pub direction: Vec3,
    pub interpolation: Interpolation,
    /// 0.0 = unspatialized, 1.0 = fully binaural
    pub spatial_blend: f32,
}

/// A native HRTF engine: one per process, shared by every spatializer.
pub trait HrtfEngine: Send + Sync {
    /// The fixed frame size every kernel processes.
    fn frame_size(&self) -> usize;

    /// Allocates a zeroed DSP staging buffer of exactly `len` samples.
    fn allocate_buffer(&self, len: usize) -> NativeResult<Vec<f32>> {
        allocate_zeroed(len)
    }

    /// Creates one binaural effect instance.
    fn create_kernel(&self) -> NativeResult<Box<dyn BinauralKernel>>;

    /// Creates one mono direct-path (occlusion and transmission) effect instance.
    fn create_direct_kernel(&self) -> NativeResult<Box<dyn DirectKernel>>;
}

/// One native binaural effect instance.
pub trait BinauralKernel: Send {
    /// Convolves `input` (N mono samples) into `output` (2N planar samples,
    /// the left channel block followed by the right channel block).
    fn apply(
        &mut self,
        params: &BinauralParams,
        input: &[f32],
        output: &mut [f32],
    ) -> NativeResult<()>;
}

/// One native direct-path effect instance.
pub trait DirectKernel: Send {
    /// Filters `input` (N mono samples) into `output` (N mono samples).
    fn apply(
        &mut self,
        params: &DirectParams,
        input: &[f32],
        output: &mut [f32],
    ) -> NativeResult<()>;
}

/// Fallible zeroed allocation; reports failure instead of aborting.
pub fn allocate_zeroed(len: usize) -> NativeResult<Vec<f32>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| NativeError::BufferAllocation { len })?;
    buffer.resize(len, 0.0);
    Ok(buffer)
}
