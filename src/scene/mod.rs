//! Level geometry queries used for occlusion.
//!
//! The game owns its collision world; CueSonic only needs to cast rays through
//! it. Implement [`RayTracer`] over your geometry, describe surfaces in a
//! [`MaterialTable`], and hand both to
//! [`RayTracedEnvironment`](crate::occlusion::RayTracedEnvironment).

pub mod material;
pub mod ray_tracer;

pub use material::{MaterialTable, SurfaceMaterial};
pub use ray_tracer::{RayHit, RayTracer};
