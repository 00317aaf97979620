use super::SpatialSnapshot;
use super::native::{BinauralKernel, BinauralParams, HrtfEngine, Interpolation, NativeResult};
use crate::math::AHEAD;

/// Result of spatializing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    Silenced,
}

/// Per-emitter HRTF spatializer over a native binaural kernel.
///
/// Buffers and the kernel are acquired once at construction. If any of them
/// cannot be acquired the spatializer runs in silent passthrough for its
/// whole lifetime: it still produces full-length frames, all zeros.
pub struct BinauralSpatializer {
    // Declaration order is release order: kernel, planar output, input.
    kernel: Option<Box<dyn BinauralKernel>>,
    planar: Vec<f32>,
    input: Vec<f32>,
    frame_size: usize,
    interpolation: Interpolation,
    spatial_blend: f32,
    apply_failing: bool,
}

impl BinauralSpatializer {
    pub fn new(engine: &dyn HrtfEngine, interpolation: Interpolation) -> Self {
        let frame_size = engine.frame_size();
        match Self::acquire(engine, frame_size) {
            Ok((input, planar, kernel)) => Self {
                kernel: Some(kernel),
                planar,
                input,
                frame_size,
                interpolation,
                spatial_blend: 1.0,
                apply_failing: false,
            },
            Err(e) => {
                log::warn!("Binaural spatializer running silent: {}", e);
                Self {
                    kernel: None,
                    planar: Vec::new(),
                    input: Vec::new(),
                    frame_size,
                    interpolation,
                    spatial_blend: 1.0,
                    apply_failing: false,
                }
            }
        }
    }

    // On early return, whatever was already acquired drops in reverse order.
    fn acquire(
        engine: &dyn HrtfEngine,
        frame_size: usize,
    ) -> NativeResult<(Vec<f32>, Vec<f32>, Box<dyn BinauralKernel>)> {
        let input = engine.allocate_buffer(frame_size)?;
        let planar = engine.allocate_buffer(frame_size * 2)?;
        let kernel = engine.create_kernel()?;
        Ok((input, planar, kernel))
    }

    pub fn with_spatial_blend(mut self, blend: f32) -> Self {
        self.spatial_blend = blend.clamp(0.0, 1.0);
        self
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// True when no native kernel is held (acquisition failed or disposed).
    pub fn is_silent(&self) -> bool {
        self.kernel.is_none()
    }

    /// Spatializes one mono frame of `frame_size` samples into `out`,
    /// `2 * frame_size` interleaved stereo samples.
    pub fn process(
        &mut self,
        mono: &[f32],
        snapshot: &SpatialSnapshot,
        out: &mut [f32],
    ) -> FrameOutcome {
        let n = self.frame_size;
        let Some(kernel) = self.kernel.as_mut() else {
            out.fill(0.0);
            return FrameOutcome::Silenced;
        };
        if mono.len() != n || out.len() != n * 2 {
            log::error!(
                "Binaural frame size mismatch: expected {} in / {} out, got {} / {}",
                n,
                n * 2,
                mono.len(),
                out.len()
            );
            out.fill(0.0);
            return FrameOutcome::Silenced;
        }

        self.input.copy_from_slice(mono);

        let direction = if snapshot.direction.is_finite() {
            snapshot.direction
        } else {
            AHEAD
        };
        let params = BinauralParams {
            direction,
            interpolation: self.interpolation,
            spatial_blend: self.spatial_blend,
        };

        if let Err(e) = kernel.apply(&params, &self.input, &mut self.planar) {
            if !self.apply_failing {
                log::error!("Binaural apply failed, outputting silence: {}", e);
                self.apply_failing = true;
            }
            out.fill(0.0);
            return FrameOutcome::Silenced;
        }
        if self.apply_failing {
            log::info!("Binaural apply recovered");
            self.apply_failing = false;
        }

        let (left, right) = self.planar.split_at(n);
        for (frame, (l, r)) in out.chunks_exact_mut(2).zip(left.iter().zip(right)) {
            frame[0] = *l;
            frame[1] = *r;
        }
        FrameOutcome::Rendered
    }

    /// Releases the kernel and both buffers. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.kernel.take().is_some() {
            log::debug!("Disposed binaural spatializer");
        }
        self.planar = Vec::new();
        self.input = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use crate::occlusion::DirectParams;
    use crate::spatial::testing::{FailPoint, FailingEngine, ReferenceEngine};

    fn snapshot(direction: Vec3) -> SpatialSnapshot {
        SpatialSnapshot {
            direction,
            pan: 0.0,
            direct: DirectParams::CLEAR,
        }
    }

    #[test]
    fn test_interleaves_planar_output() {
        let engine = ReferenceEngine::new(4);
        let mut spatializer = BinauralSpatializer::new(&engine, Interpolation::Bilinear);
        let mono = [1.0, 1.0, 1.0, 1.0];
        let mut out = [9.0; 8];

        // Hard right: the reference kernel sends everything to the right ear.
        let outcome = spatializer.process(&mono, &snapshot(Vec3::X), &mut out);
        assert_eq!(outcome, FrameOutcome::Rendered);
        for frame in out.chunks_exact(2) {
            assert!(frame[0].abs() < 1e-6);
            assert!(frame[1] > 0.0);
        }
    }

    #[test]
    fn test_allocation_failure_is_silent_passthrough() {
        for point in [FailPoint::InputBuffer, FailPoint::OutputBuffer, FailPoint::Kernel] {
            let engine = FailingEngine::new(4, point);
            let mut spatializer = BinauralSpatializer::new(&engine, Interpolation::Nearest);
            assert!(spatializer.is_silent());

            let mut out = [5.0; 8];
            let outcome = spatializer.process(&[1.0; 4], &snapshot(AHEAD), &mut out);
            assert_eq!(outcome, FrameOutcome::Silenced);
            assert!(out.iter().all(|s| *s == 0.0));

            // Whatever was acquired before the failure is released once.
            spatializer.dispose();
            spatializer.dispose();
            let mut out = [5.0; 8];
            let outcome = spatializer.process(&[1.0; 4], &snapshot(AHEAD), &mut out);
            assert_eq!(outcome, FrameOutcome::Silenced, "{:?}", point);
            assert!(out.iter().all(|s| *s == 0.0));
        }
    }

    #[test]
    fn test_apply_failure_outputs_zeros() {
        let engine = FailingEngine::new(4, FailPoint::Apply);
        let mut spatializer = BinauralSpatializer::new(&engine, Interpolation::Bilinear);
        assert!(!spatializer.is_silent());

        let mut out = [5.0; 8];
        for _ in 0..3 {
            let outcome = spatializer.process(&[1.0; 4], &snapshot(AHEAD), &mut out);
            assert_eq!(outcome, FrameOutcome::Silenced);
            assert!(out.iter().all(|s| *s == 0.0));
        }
    }

    #[test]
    fn test_non_finite_direction_falls_back_to_ahead() {
        let engine = ReferenceEngine::new(4);
        let mut a = BinauralSpatializer::new(&engine, Interpolation::Bilinear);
        let mut b = BinauralSpatializer::new(&engine, Interpolation::Bilinear);
        let mut out_a = [0.0; 8];
        let mut out_b = [0.0; 8];

        a.process(&[0.5; 4], &snapshot(Vec3::new(f32::NAN, 0.0, 0.0)), &mut out_a);
        b.process(&[0.5; 4], &snapshot(AHEAD), &mut out_b);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let engine = ReferenceEngine::new(4);
        let mut spatializer = BinauralSpatializer::new(&engine, Interpolation::Bilinear);
        spatializer.dispose();
        spatializer.dispose();
        assert!(spatializer.is_silent());

        let mut out = [1.0; 8];
        spatializer.process(&[1.0; 4], &snapshot(AHEAD), &mut out);
        assert!(out.iter().all(|s| *s == 0.0));
    }
}
