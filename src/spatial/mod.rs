//! Spatialization: turning a mono stream plus a listener-local direction into
//! interleaved stereo.
//!
//! The native HRTF engine works on fixed frames of `frame_size` samples. The
//! mixer asks for arbitrary sizes. [`FrameAdapter`] bridges the two, carrying
//! the unconsumed tail of each spatialized frame to the next read.

mod adapter;
mod binaural;
mod native;
mod pan;
mod steam;

pub use adapter::{FrameAdapter, Spatializer};
pub use binaural::{BinauralSpatializer, FrameOutcome};
pub use native::{
    BinauralKernel, BinauralParams, DirectKernel, HrtfEngine, Interpolation, NativeError,
    NativeResult, allocate_zeroed,
};
pub use pan::{PanSpatializer, pan_gains};
pub use steam::SteamHrtfEngine;

use crate::math::{AHEAD, Vec3};
use crate::occlusion::DirectParams;

/// Everything the audio thread needs to render one emitter, published by the
/// simulation thread as a single unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialSnapshot {
    /// Listener-local direction in DSP convention (`-Z` forward)
    pub direction: Vec3,
    /// Stereo pan for the no-HRTF fallback, in [-1, 1]
    pub pan: f32,
    pub direct: DirectParams,
}

impl Default for SpatialSnapshot {
    fn default() -> Self {
        Self {
            direction: AHEAD,
            pan: 0.0,
            direct: DirectParams::CLEAR,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic stand-ins for the native engine.

    use super::native::*;
    use crate::occlusion::DirectParams;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Pans by direction and smooths with one sample of memory, so output
    /// depends on frame history the way a real convolution does.
    pub struct ReferenceEngine {
        frame_size: usize,
        pub kernels_created: Arc<AtomicUsize>,
    }

    impl ReferenceEngine {
        pub fn new(frame_size: usize) -> Self {
            Self {
                frame_size,
                kernels_created: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl HrtfEngine for ReferenceEngine {
        fn frame_size(&self) -> usize {
            self.frame_size
        }

        fn create_kernel(&self) -> NativeResult<Box<dyn BinauralKernel>> {
            self.kernels_created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ReferenceKernel {
                frame_size: self.frame_size,
                previous: 0.0,
            }))
        }

        fn create_direct_kernel(&self) -> NativeResult<Box<dyn DirectKernel>> {
            Ok(Box::new(ReferenceDirectKernel))
        }
    }

    /// Passes the clear fraction plus the low band of the transmitted part,
    /// unfiltered.
    pub struct ReferenceDirectKernel;

    impl DirectKernel for ReferenceDirectKernel {
        fn apply(
            &mut self,
            params: &DirectParams,
            input: &[f32],
            output: &mut [f32],
        ) -> NativeResult<()> {
            let a = params.attenuation;
            let gain = a + (1.0 - a) * params.transmission[0];
            for (y, x) in output.iter_mut().zip(input) {
                *y = gain * x;
            }
            Ok(())
        }
    }

    struct ReferenceKernel {
        frame_size: usize,
        previous: f32,
    }

    impl BinauralKernel for ReferenceKernel {
        fn apply(
            &mut self,
            params: &BinauralParams,
            input: &[f32],
            output: &mut [f32],
        ) -> NativeResult<()> {
            let n = self.frame_size;
            let dir = params.direction.normalize_or_zero();
            let right = (1.0 + dir.x) * 0.5;
            let left = 1.0 - right;
            for (i, x) in input.iter().enumerate() {
                let smoothed = 0.5 * (x + self.previous);
                self.previous = *x;
                output[i] = smoothed * left;
                output[n + i] = smoothed * right;
            }
            Ok(())
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailPoint {
        InputBuffer,
        OutputBuffer,
        Kernel,
        DirectKernel,
        Apply,
    }

    pub struct FailingEngine {
        frame_size: usize,
        point: FailPoint,
    }

    impl FailingEngine {
        pub fn new(frame_size: usize, point: FailPoint) -> Self {
            Self { frame_size, point }
        }
    }

    impl HrtfEngine for FailingEngine {
        fn frame_size(&self) -> usize {
            self.frame_size
        }

        fn allocate_buffer(&self, len: usize) -> NativeResult<Vec<f32>> {
            let failing = match self.point {
                FailPoint::InputBuffer => len == self.frame_size,
                FailPoint::OutputBuffer => len == self.frame_size * 2,
                _ => false,
            };
            if failing {
                return Err(NativeError::BufferAllocation { len });
            }
            allocate_zeroed(len)
        }

        fn create_kernel(&self) -> NativeResult<Box<dyn BinauralKernel>> {
            match self.point {
                FailPoint::Kernel => Err(NativeError::EffectCreation("refused".into())),
                _ => Ok(Box::new(BrokenKernel)),
            }
        }

        fn create_direct_kernel(&self) -> NativeResult<Box<dyn DirectKernel>> {
            match self.point {
                FailPoint::DirectKernel => Err(NativeError::EffectCreation("refused".into())),
                FailPoint::Apply => Ok(Box::new(BrokenKernel)),
                _ => Ok(Box::new(ReferenceDirectKernel)),
            }
        }
    }

    struct BrokenKernel;

    impl BinauralKernel for BrokenKernel {
        fn apply(&mut self, _: &BinauralParams, _: &[f32], _: &mut [f32]) -> NativeResult<()> {
            Err(NativeError::Apply("status 1".into()))
        }
    }

    impl DirectKernel for BrokenKernel {
        fn apply(&mut self, _: &DirectParams, _: &[f32], _: &mut [f32]) -> NativeResult<()> {
            Err(NativeError::Apply("status 1".into()))
        }
    }
}
