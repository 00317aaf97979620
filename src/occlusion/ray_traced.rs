use super::{DirectParams, EnvironmentSimulator, OcclusionHandle};
use crate::math::{ListenerBasis, Vec3};
use crate::scene::{MaterialTable, RayTracer};
use std::collections::HashMap;

/// How far past a surface the next ray starts.
const SURFACE_EPSILON: f32 = 1e-3;

/// [`EnvironmentSimulator`] built on a game-provided [`RayTracer`].
///
/// Casts from the listener to each source; every surface crossed multiplies
/// the per-band transmission by its material's, up to `max_surfaces`.
pub struct RayTracedEnvironment<T: RayTracer> {
    tracer: T,
    materials: MaterialTable,
    listener: Vec3,
    sources: HashMap<OcclusionHandle, Vec3>,
    next_handle: u32,
    max_surfaces: usize,
}

impl<T: RayTracer> RayTracedEnvironment<T> {
    pub fn new(tracer: T, materials: MaterialTable) -> Self {
        Self {
            tracer,
            materials,
            listener: Vec3::ZERO,
            sources: HashMap::new(),
            next_handle: 0,
            max_surfaces: 4,
        }
    }

    pub fn with_max_surfaces(mut self, max_surfaces: usize) -> Self {
        self.max_surfaces = max_surfaces.max(1);
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    fn trace(&self, target: Vec3) -> DirectParams {
        let offset = target - self.listener;
        let distance = offset.length();
        if !distance.is_finite() || distance < SURFACE_EPSILON {
            return DirectParams::CLEAR;
        }

        let direction = offset / distance;
        let mut origin = self.listener;
        let mut remaining = distance;
        let mut transmission = [1.0f32; 3];
        let mut surfaces = 0;

        while surfaces < self.max_surfaces {
            let hit = self.tracer.cast_ray(origin, direction, remaining);
            if !hit.hit || hit.distance >= remaining {
                break;
            }

            surfaces += 1;
            let material = self
                .materials
                .get(hit.material_index)
                .copied()
                .unwrap_or_default();
            for (band, t) in transmission.iter_mut().zip(material.transmission) {
                *band *= t;
            }

            let step = hit.distance + SURFACE_EPSILON;
            origin += direction * step;
            remaining -= step;
            if remaining <= 0.0 {
                break;
            }
        }

        if surfaces == 0 {
            DirectParams::CLEAR
        } else {
            DirectParams::blocked(transmission)
        }
    }
}

impl<T: RayTracer> EnvironmentSimulator for RayTracedEnvironment<T> {
    fn register_source(&mut self) -> Option<OcclusionHandle> {
        let handle = OcclusionHandle(self.next_handle);
        self.next_handle = self.next_handle.checked_add(1)?;
        self.sources.insert(handle, self.listener);
        log::debug!("Registered occlusion source {:?}", handle);
        Some(handle)
    }

    fn unregister_source(&mut self, handle: OcclusionHandle) {
        if self.sources.remove(&handle).is_some() {
            log::debug!("Unregistered occlusion source {:?}", handle);
        }
    }

    fn set_source_position(&mut self, handle: OcclusionHandle, position: Vec3) {
        if let Some(slot) = self.sources.get_mut(&handle) {
            *slot = position;
        }
    }

    fn set_listener(&mut self, listener: &ListenerBasis) {
        self.listener = listener.position;
    }

    fn direct_params(&mut self, handle: OcclusionHandle) -> Option<DirectParams> {
        let target = *self.sources.get(&handle)?;
        Some(self.trace(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{RayHit, SurfaceMaterial};

    /// Infinite walls perpendicular to X.
    struct Walls {
        xs: Vec<(f32, u8)>,
    }

    impl RayTracer for Walls {
        fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> RayHit {
            if direction.x.abs() < 1e-6 {
                return RayHit::miss();
            }
            self.xs
                .iter()
                .filter_map(|&(x, material)| {
                    let t = (x - origin.x) / direction.x;
                    (t > 0.0 && t <= max_distance).then_some((t, material))
                })
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(t, material)| RayHit::new(t, material))
                .unwrap_or_default()
        }
    }

    fn env(xs: Vec<(f32, u8)>) -> RayTracedEnvironment<Walls> {
        RayTracedEnvironment::new(Walls { xs }, MaterialTable::with_presets())
    }

    #[test]
    fn test_clear_line_of_sight() {
        let mut env = env(vec![(5.0, 2)]);
        let h = env.register_source().unwrap();
        env.set_source_position(h, Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(env.direct_params(h), Some(DirectParams::CLEAR));
    }

    #[test]
    fn test_single_wall() {
        let mut env = env(vec![(5.0, 5)]);
        let h = env.register_source().unwrap();
        env.set_source_position(h, Vec3::new(10.0, 0.0, 0.0));
        let params = env.direct_params(h).unwrap();
        assert_eq!(params.attenuation, 0.0);
        assert_eq!(params.transmission, SurfaceMaterial::WOOD.transmission);
    }

    #[test]
    fn test_two_walls_multiply() {
        let mut env = env(vec![(2.0, 8), (6.0, 8)]);
        let h = env.register_source().unwrap();
        env.set_source_position(h, Vec3::new(10.0, 0.0, 0.0));
        let open = SurfaceMaterial::OPEN.transmission;
        let params = env.direct_params(h).unwrap();
        for band in 0..3 {
            assert!((params.transmission[band] - open[band] * open[band]).abs() < 1e-6);
        }
        // High frequencies lose more through each wall.
        assert!(params.transmission[2] <= params.transmission[0]);
    }

    #[test]
    fn test_unknown_handle_is_none() {
        let mut env = env(vec![]);
        let h = env.register_source().unwrap();
        env.unregister_source(h);
        assert_eq!(env.direct_params(h), None);
        assert_eq!(env.source_count(), 0);
    }

    #[test]
    fn test_listener_moves() {
        let mut env = env(vec![(5.0, 2)]);
        let h = env.register_source().unwrap();
        env.set_source_position(h, Vec3::new(10.0, 0.0, 0.0));
        env.set_listener(&ListenerBasis::new(Vec3::new(8.0, 0.0, 0.0), Vec3::Z, Vec3::Y));
        assert!(env.direct_params(h).unwrap().is_clear());
    }
}
