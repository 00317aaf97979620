//! Direct-path occlusion.
//!
//! The environment simulator is queried on the simulation thread; the resulting
//! [`DirectParams`] are published with the emitter's direction and applied by
//! the [`OcclusionStage`] on the audio thread, ahead of the spatializer. They
//! are kept separate from distance volume so both stay independently tunable.
//!
//! With a native engine the stage runs Steam Audio's direct effect, which
//! filters the transmitted path per band. Without one it falls back to a
//! broadband one-pole approximation.

mod ray_traced;

pub use ray_traced::RayTracedEnvironment;

use crate::context::AudioContext;
use crate::math::{ListenerBasis, Vec3};
use crate::spatial::{DirectKernel, HrtfEngine};
use std::f32::consts::PI;

/// Cutoff of the fallback low-pass applied to the transmitted (through-wall) path.
const TRANSMISSION_CUTOFF_HZ: f32 = 1000.0;

/// Handle to a source registered with an [`EnvironmentSimulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OcclusionHandle(pub u32);

/// Direct-path parameters for one source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectParams {
    /// Unoccluded fraction of the direct path (1.0 = clear line of sight)
    pub attenuation: f32,
    /// Fraction of the occluded part that passes through geometry,
    /// per band [low, mid, high]
    pub transmission: [f32; 3],
}

impl DirectParams {
    pub const CLEAR: Self = Self {
        attenuation: 1.0,
        transmission: [1.0; 3],
    };

    /// Fully occluded, letting `transmission` through.
    pub const fn blocked(transmission: [f32; 3]) -> Self {
        Self {
            attenuation: 0.0,
            transmission,
        }
    }

    pub fn is_clear(&self) -> bool {
        self.attenuation >= 1.0
    }

    pub fn mean_transmission(&self) -> f32 {
        self.transmission.iter().sum::<f32>() / 3.0
    }
}

impl Default for DirectParams {
    fn default() -> Self {
        Self::CLEAR
    }
}

/// External environment simulation (ray/occlusion tests against level geometry).
///
/// Every failure is reported as `None` and treated as "no occlusion".
pub trait EnvironmentSimulator: Send {
    fn register_source(&mut self) -> Option<OcclusionHandle>;

    fn unregister_source(&mut self, handle: OcclusionHandle);

    fn set_source_position(&mut self, handle: OcclusionHandle, position: Vec3);

    /// Moves the listener. [`Emitter::update`](crate::Emitter::update) calls
    /// this before every query.
    fn set_listener(&mut self, listener: &ListenerBasis);

    fn direct_params(&mut self, handle: OcclusionHandle) -> Option<DirectParams>;
}

/// Broadband approximation of the direct effect:
/// `y = a·x + (1 − a)·t̄·LP(x)` with `t̄` the mean band transmission.
#[derive(Debug, Clone)]
pub struct OnePoleOcclusion {
    coeff: f32,
    lowpassed: f32,
}

impl OnePoleOcclusion {
    pub fn new(sample_rate: u32) -> Self {
        let rc = 1.0 / (2.0 * PI * TRANSMISSION_CUTOFF_HZ);
        let dt = 1.0 / sample_rate.max(1) as f32;
        Self {
            coeff: dt / (rc + dt),
            lowpassed: 0.0,
        }
    }

    pub fn process(&mut self, buffer: &mut [f32], params: &DirectParams) {
        let a = params.attenuation.clamp(0.0, 1.0);
        let t = params.mean_transmission().clamp(0.0, 1.0);
        let through = (1.0 - a) * t;

        // Keep the filter state running even when clear so occlusion fades in smoothly.
        for sample in buffer.iter_mut() {
            let x = *sample;
            self.lowpassed += self.coeff * (x - self.lowpassed);
            *sample = a * x + through * self.lowpassed;
        }
    }
}

/// Per-emitter occlusion stage, run on each mono frame before spatialization.
pub struct OcclusionStage {
    // Released before its staging buffer.
    kernel: Option<Box<dyn DirectKernel>>,
    input: Vec<f32>,
    fallback: OnePoleOcclusion,
    apply_failing: bool,
}

impl OcclusionStage {
    /// A stage that only uses the one-pole fallback.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            kernel: None,
            input: Vec::new(),
            fallback: OnePoleOcclusion::new(sample_rate),
            apply_failing: false,
        }
    }

    /// A stage backed by the engine's native direct effect, or the fallback
    /// if the effect or its buffer cannot be created.
    pub fn with_engine(engine: &dyn HrtfEngine, sample_rate: u32) -> Self {
        let mut stage = Self::new(sample_rate);
        let acquired = engine
            .allocate_buffer(engine.frame_size())
            .and_then(|input| Ok((input, engine.create_direct_kernel()?)));
        match acquired {
            Ok((input, kernel)) => {
                stage.input = input;
                stage.kernel = Some(kernel);
            }
            Err(e) => log::warn!("Direct effect unavailable, using one-pole occlusion: {}", e),
        }
        stage
    }

    /// Native when the context has an engine, the fallback otherwise.
    pub fn for_context(context: &AudioContext) -> Self {
        match context.hrtf() {
            Some(engine) => Self::with_engine(engine.as_ref(), context.sample_rate()),
            None => Self::new(context.sample_rate()),
        }
    }

    /// True when the native direct effect is in use.
    pub fn is_native(&self) -> bool {
        self.kernel.is_some()
    }

    pub fn process(&mut self, buffer: &mut [f32], params: &DirectParams) {
        if let Some(kernel) = self.kernel.as_mut() {
            if buffer.len() == self.input.len() {
                self.input.copy_from_slice(buffer);
                match kernel.apply(params, &self.input, buffer) {
                    Ok(()) => {
                        if self.apply_failing {
                            log::info!("Direct effect recovered");
                            self.apply_failing = false;
                        }
                        return;
                    }
                    Err(e) => {
                        if !self.apply_failing {
                            log::error!("Direct effect failed, using one-pole occlusion: {}", e);
                            self.apply_failing = true;
                        }
                        buffer.copy_from_slice(&self.input);
                    }
                }
            }
        }
        self.fallback.process(buffer, params);
    }

    /// Releases the native effect and its buffer. Later frames use the fallback.
    pub fn dispose(&mut self) {
        self.kernel = None;
        self.input = Vec::new();
    }
}
