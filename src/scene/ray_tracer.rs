//! Ray casting callback into the game's collision world.

use crate::math::Vec3;

/// Result of a ray intersection test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub hit: bool,
    /// Distance from ray origin to the hit point; meaningful only on a hit
    pub distance: f32,
    /// Index into the [`MaterialTable`](super::MaterialTable)
    pub material_index: u8,
}

impl RayHit {
    pub fn miss() -> Self {
        Self {
            hit: false,
            distance: 0.0,
            material_index: 0,
        }
    }

    pub fn new(distance: f32, material_index: u8) -> Self {
        Self {
            hit: true,
            distance,
            material_index,
        }
    }
}

impl Default for RayHit {
    fn default() -> Self {
        Self::miss()
    }
}

/// Closest-hit ray queries against level geometry.
///
/// Called from the simulation thread while emitters update, never from the
/// audio callback.
pub trait RayTracer: Send {
    /// Returns the closest hit along `direction` (normalized) within `max_distance`.
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> RayHit;
}
