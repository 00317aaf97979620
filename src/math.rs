//! Math types for CueSonic
//!
//! World space follows the game: `+Y` is up and the listener basis is supplied
//! per tick. The HRTF stage expects listener-local directions where `-Z` is
//! forward, so [`compute_emitter_mix`] flips the forward component on the way out.

use crate::config::AttenuationParams;
pub use glam::{Quat, Vec3};

/// Direction handed to the DSP stage when the emitter sits on the listener.
pub const AHEAD: Vec3 = Vec3::new(0.0, 0.0, -1.0);

/// Extra pan applied to sources behind the listener, where panning alone
/// cannot carry the front/back cue.
pub const BEHIND_PAN_PUSH: f32 = 0.3;

/// Listener position plus its orthonormal basis, rebuilt every simulation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerBasis {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub right: Vec3,
}

impl ListenerBasis {
    /// Builds the basis from the listener feed. `right` is derived as `up × forward`.
    pub fn new(position: Vec3, forward: Vec3, up: Vec3) -> Self {
        let forward = forward.normalize_or_zero();
        let up = up.normalize_or_zero();
        let right = up.cross(forward).normalize_or_zero();
        Self {
            position,
            forward,
            up,
            right,
        }
    }

    /// Builds the basis from a game-style rotation where `+Z` is forward.
    pub fn from_rotation(position: Vec3, rotation: Quat) -> Self {
        Self::new(position, rotation * Vec3::Z, rotation * Vec3::Y)
    }

    /// Projects a world-space unit vector onto the listener basis.
    pub fn to_local(&self, world_dir: Vec3) -> Vec3 {
        Vec3::new(
            world_dir.dot(self.right),
            world_dir.dot(self.up),
            world_dir.dot(self.forward),
        )
    }
}

impl Default for ListenerBasis {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::Z, Vec3::Y)
    }
}

/// Everything the render side needs to place one emitter for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterMix {
    /// Listener-local direction in DSP convention (`-Z` forward)
    pub direction: Vec3,
    pub distance: f32,
    pub volume: f32,
    /// Pan fallback in [-1, 1], used when no HRTF engine is available
    pub pan: f32,
}

/// Computes direction, distance-derived volume and pan for one emitter.
///
/// Runs on the simulation thread once per tick, never on the audio thread.
pub fn compute_emitter_mix(
    emitter_position: Vec3,
    listener: &ListenerBasis,
    params: &AttenuationParams,
) -> EmitterMix {
    let offset = emitter_position - listener.position;
    let distance = offset.length();

    if !distance.is_finite() {
        return EmitterMix {
            direction: AHEAD,
            distance,
            volume: params.min_volume,
            pan: 0.0,
        };
    }

    if distance <= params.near_threshold {
        return EmitterMix {
            direction: AHEAD,
            distance,
            volume: params.max_volume,
            pan: 0.0,
        };
    }

    let local = listener.to_local(offset / distance);
    let direction = Vec3::new(local.x, local.y, -local.z);

    EmitterMix {
        direction,
        distance,
        volume: distance_volume(distance, params),
        pan: fallback_pan(local.x, local.z),
    }
}

/// Squared falloff from `max_volume` down to the `min_volume` floor at `max_range`.
pub fn distance_volume(distance: f32, params: &AttenuationParams) -> f32 {
    let t = if params.max_range > 0.0 {
        (distance / params.max_range).min(1.0)
    } else {
        1.0
    };
    let falloff = (1.0 - t) * (1.0 - t);
    params.min_volume + falloff * (params.max_volume - params.min_volume)
}

/// Pan value from the right component, pushed outward when the source is behind.
pub fn fallback_pan(right: f32, forward: f32) -> f32 {
    let pan = right.clamp(-1.0, 1.0);
    if forward < 0.0 && pan != 0.0 {
        (pan + BEHIND_PAN_PUSH * pan.signum()).clamp(-1.0, 1.0)
    } else {
        pan
    }
}
