//! # CueSonic
//!
//! A real-time spatial audio pipeline for positional audio cues, built on Steam Audio's
//! HRTF for binaural rendering.
//!
//! Game code owns the simulation side: it places [`Emitter`]s in the world and, once per
//! tick, hands them the listener basis. Each emitter computes its listener-local direction
//! and distance volume and publishes them under a short lock. The audio device pulls frames
//! on its own clock through the [`Mixer`], which sums every emitter's spatialized output.
//!
//! ## Quick Start
//!
//! ```no_run
//! use cuesonic::*;
//!
//! let desc = CueSonicDesc::default();
//! let context = AudioContext::new(desc.clone())?;
//! let (mixer, renderer) = Mixer::new(&desc);
//! let _output = OutputDevice::open(desc.clone(), renderer)?;
//!
//! // A beeping emitter ten units to the right
//! let mut emitter = Emitter::new(
//!     &context,
//!     &mixer,
//!     Oscillator::for_cue(CueKind::Beep, desc.sample_rate),
//! )?;
//! emitter.activate(Vec3::new(10.0, 0.0, 0.0));
//!
//! // Every simulation tick
//! let listener = ListenerBasis::new(Vec3::ZERO, Vec3::Z, Vec3::Y);
//! emitter.update(&listener, &AttenuationParams::default(), None);
//!
//! // When the owning game context ends
//! emitter.dispose();
//! mixer.collect_retired();
//! # Ok::<(), CueSonicError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`AudioContext`]**: the process-wide native HRTF context, passed to every emitter
//! - **[`Emitter`]**: one 3D sound source; activate/deactivate without tearing down DSP state
//! - **[`Mixer`]** / **[`MixerRenderer`]**: registry on the control side, summing on the audio side
//! - **[`OutputDevice`]**: the single cpal output stream
//! - **[`FrameAdapter`](spatial::FrameAdapter)**: bridges fixed HRTF frames to arbitrary pull sizes
//! - **[`ToneSequencer`]**: background scheduler for timed tone sequences
//! - **[`RayTracedEnvironment`]**: occlusion from a user-supplied [`RayTracer`]
//!
//! ## Threading
//!
//! 1. **Simulation thread**: owns emitters, computes direction/volume, queries occlusion
//! 2. **Audio callback**: pulls the mixer; never allocates in steady state, never blocks
//! 3. **Sequencer thread**: steps tone sequences on [`CueChannel`]s
//!
//! When the HRTF engine cannot be created, emitters fall back to constant-power panning.
//! When an individual effect cannot be created, that emitter renders silence.
pub mod audio_data;
pub mod config;
pub mod context;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod math;
pub mod mixer;
pub mod occlusion;
pub mod scene;
pub mod sequencer;
pub mod source;
pub mod spatial;

pub use audio_data::{AudioClip, LoadOptions};
pub use config::{AttenuationParams, CueSonicDesc};
pub use context::AudioContext;
pub use emitter::{DirectionState, Emitter, EmitterVoice, SharedDirectionState};
pub use engine::OutputDevice;
pub use error::{CueSonicError, Result};
pub use math::{EmitterMix, ListenerBasis, Quat, Vec3, compute_emitter_mix};
pub use mixer::{InputId, Mixer, MixerInput, MixerRenderer};
pub use occlusion::{DirectParams, EnvironmentSimulator, OcclusionHandle, RayTracedEnvironment};
pub use scene::{MaterialTable, RayHit, RayTracer, SurfaceMaterial};
pub use sequencer::{CueChannel, ToneSequence, ToneSequencer, ToneStep};
pub use source::{ClipSource, CueKind, LoopMode, MonoSource, Oscillator, Silence, ToneSpec, Waveform};
pub use spatial::{Interpolation, SpatialSnapshot};
