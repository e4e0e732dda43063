// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod interval;
mod onb;
mod ray;
pub mod sampling;
mod spherical;

pub use aabb::Aabb;
pub use interval::Interval;
pub use onb::Onb;
pub use ray::Ray;
pub use spherical::{get_sphere_uv, luminance, uv_to_sphere, wavelength_to_rgb};

/// Tolerance for near-zero checks. 1e-6 is safer for f32 than 1e-8.
pub const EPSILON: f32 = 1e-6;

/// Ray origin bias that prevents shadow acne (self-intersection).
pub const SHADOW_EPSILON: f32 = 1e-3;

/// Padding applied to flat bounding boxes so BVH slabs stay testable.
pub const PADDING_EPSILON: f32 = 1e-4;

/// True if every component of `v` is within EPSILON of zero.
#[inline]
pub fn near_zero(v: Vec3) -> bool {
    v.x.abs() < EPSILON && v.y.abs() < EPSILON && v.z.abs() < EPSILON
}
