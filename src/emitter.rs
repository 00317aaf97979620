//! Emitters: one logical 3D sound source each.
//!
//! An emitter is split across the two execution contexts:
//!
//! - [`Emitter`] is owned by game code on the simulation thread. It holds the
//!   world position and active flag, computes direction and volume once per
//!   tick and publishes them.
//! - [`EmitterVoice`] is the mixer input living on the audio thread. It owns
//!   the mono source, occlusion stage, spatializer and frame adapter, and reads
//!   the latest published state at the start of every pull.
//!
//! The two share a [`SharedDirectionState`]. The audio side only ever
//! `try_lock`s it to copy a few scalars out; if the lock is busy it keeps
//! rendering with the previous snapshot.

use crate::config::AttenuationParams;
use crate::context::AudioContext;
use crate::error::Result;
use crate::math::{EmitterMix, ListenerBasis, Vec3, compute_emitter_mix};
use crate::mixer::{InputId, Mixer, MixerInput};
use crate::occlusion::{DirectParams, EnvironmentSimulator, OcclusionHandle, OcclusionStage};
use crate::source::MonoSource;
use crate::spatial::{FrameAdapter, SpatialSnapshot, Spatializer};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

/// State published by the simulation thread for one emitter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DirectionState {
    pub snapshot: SpatialSnapshot,
    /// Distance-derived volume, 0..=1
    pub volume: f32,
    pub active: bool,
}

/// Per-emitter lock around the published [`DirectionState`].
#[derive(Debug, Default)]
pub struct SharedDirectionState {
    state: Mutex<DirectionState>,
}

impl SharedDirectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulation side: replaces the published state.
    pub fn publish(&self, state: DirectionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Audio side: copies the state out without blocking. `None` if contended.
    pub fn try_snapshot(&self) -> Option<DirectionState> {
        match self.state.try_lock() {
            Ok(guard) => Some(*guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(*poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

/// Render side of an emitter. Registered with the mixer for the emitter's
/// whole lifetime; deactivation only ramps it to silence.
pub struct EmitterVoice {
    adapter: FrameAdapter,
    shared: Arc<SharedDirectionState>,
    state: DirectionState,
    gain: f32,
}

impl EmitterVoice {
    pub fn new(adapter: FrameAdapter, shared: Arc<SharedDirectionState>) -> Self {
        Self {
            adapter,
            shared,
            state: DirectionState::default(),
            gain: 0.0,
        }
    }
}

impl MixerInput for EmitterVoice {
    fn read(&mut self, out: &mut [f32]) {
        if let Some(state) = self.shared.try_snapshot() {
            self.state = state;
        }

        let target = if self.state.active {
            self.state.volume.clamp(0.0, 1.0)
        } else {
            0.0
        };

        // Fully faded out: skip the DSP and leave the source where it is.
        if target == 0.0 && self.gain == 0.0 {
            out.fill(0.0);
            return;
        }

        self.adapter.read(out, &self.state.snapshot);

        let frames = out.len() / 2;
        if frames > 0 {
            let step = (target - self.gain) / frames as f32;
            for (i, frame) in out.chunks_exact_mut(2).enumerate() {
                let g = self.gain + step * (i + 1) as f32;
                frame[0] *= g;
                frame[1] *= g;
            }
        }
        self.gain = target;
    }
}

impl Drop for EmitterVoice {
    fn drop(&mut self) {
        // Runs on the control thread once the mixer has retired the voice.
        self.adapter.dispose();
    }
}

/// Simulation-side handle for one 3D sound source.
pub struct Emitter {
    id: InputId,
    mixer: Mixer,
    shared: Arc<SharedDirectionState>,
    position: Vec3,
    active: bool,
    occlusion: Option<OcclusionHandle>,
    published: DirectionState,
    last_mix: Option<EmitterMix>,
    disposed: bool,
}

impl Emitter {
    /// Builds the render chain for `source` and registers it with the mixer.
    ///
    /// The emitter starts inactive. Call [`activate`](Self::activate) and then
    /// [`update`](Self::update) to make it audible.
    pub fn new(
        context: &AudioContext,
        mixer: &Mixer,
        source: impl MonoSource + 'static,
    ) -> Result<Self> {
        let adapter = FrameAdapter::new(
            Box::new(source),
            OcclusionStage::for_context(context),
            Spatializer::for_context(context),
        );
        let shared = Arc::new(SharedDirectionState::new());
        let voice = EmitterVoice::new(adapter, Arc::clone(&shared));
        let id = mixer.add_input(Box::new(voice))?;

        log::debug!("Created emitter {} (hrtf: {})", id, context.has_hrtf());

        Ok(Self {
            id,
            mixer: mixer.clone(),
            shared,
            position: Vec3::ZERO,
            active: false,
            occlusion: None,
            published: DirectionState::default(),
            last_mix: None,
            disposed: false,
        })
    }

    pub fn id(&self) -> InputId {
        self.id
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn occlusion_handle(&self) -> Option<OcclusionHandle> {
        self.occlusion
    }

    /// The mix computed by the last [`update`](Self::update), if any.
    pub fn last_mix(&self) -> Option<&EmitterMix> {
        self.last_mix.as_ref()
    }

    /// The state most recently published to the audio side.
    pub fn published(&self) -> DirectionState {
        self.published
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Makes the emitter audible at `position`. Native resources are kept.
    pub fn activate(&mut self, position: Vec3) {
        if self.disposed {
            return;
        }
        self.position = position;
        self.active = true;
        self.publish(DirectionState {
            active: true,
            ..self.published
        });
    }

    /// Fades the emitter out. It stays registered with the mixer.
    pub fn deactivate(&mut self) {
        if self.disposed || !self.active {
            return;
        }
        self.active = false;
        self.publish(DirectionState {
            active: false,
            ..self.published
        });
    }

    /// Registers with the environment simulator. Returns false if it refused.
    pub fn enable_occlusion(&mut self, environment: &mut dyn EnvironmentSimulator) -> bool {
        if self.occlusion.is_some() {
            return true;
        }
        self.occlusion = environment.register_source();
        if self.occlusion.is_none() {
            log::warn!("Emitter {}: environment refused occlusion source", self.id);
        }
        self.occlusion.is_some()
    }

    pub fn disable_occlusion(&mut self, environment: &mut dyn EnvironmentSimulator) {
        if let Some(handle) = self.occlusion.take() {
            environment.unregister_source(handle);
        }
    }

    /// Recomputes direction, volume and occlusion for this tick and publishes
    /// them to the audio side. The environment is moved to `listener` before
    /// it is queried.
    pub fn update(
        &mut self,
        listener: &ListenerBasis,
        params: &AttenuationParams,
        environment: Option<&mut dyn EnvironmentSimulator>,
    ) -> EmitterMix {
        let mix = compute_emitter_mix(self.position, listener, params);

        let direct = match (self.occlusion, environment) {
            (Some(handle), Some(env)) => {
                env.set_listener(listener);
                env.set_source_position(handle, self.position);
                env.direct_params(handle).unwrap_or(DirectParams::CLEAR)
            }
            _ => DirectParams::CLEAR,
        };

        if !self.disposed {
            self.publish(DirectionState {
                snapshot: SpatialSnapshot {
                    direction: mix.direction,
                    pan: mix.pan,
                    direct,
                },
                volume: mix.volume,
                active: self.active,
            });
        }

        self.last_mix = Some(mix);
        mix
    }

    /// Unregisters from the mixer. Safe to call more than once.
    ///
    /// The render chain is released off the audio thread once the renderer
    /// has retired it (see [`Mixer::collect_retired`]).
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.active = false;
        self.publish(DirectionState {
            active: false,
            ..self.published
        });
        self.mixer.remove_input(self.id);

        if let Some(handle) = self.occlusion {
            log::debug!(
                "Emitter {} disposed with occlusion handle {:?} still registered",
                self.id,
                handle
            );
        }
        log::debug!("Disposed emitter {}", self.id);
    }

    /// Releases the occlusion registration, then disposes.
    pub fn dispose_with(&mut self, environment: &mut dyn EnvironmentSimulator) {
        self.disable_occlusion(environment);
        self.dispose();
    }

    fn publish(&mut self, state: DirectionState) {
        self.published = state;
        self.shared.publish(state);
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        self.dispose();
    }
}
