//! Ray type for path tracing.
//!
//! A ray carries its origin, a unit direction with a cached component-wise
//! reciprocal (for the AABB slab test), a shutter time for motion blur, and
//! an optional wavelength for dispersive materials.

use glam::Vec3;

/// A ray with origin, normalized direction, time and wavelength.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    origin: Vec3,
    /// Unit direction; normalized by the constructor.
    direction: Vec3,
    /// Cached 1/direction per component. Infinities where a component is 0
    /// are fine: the slab test's min/max handles them consistently.
    inv_direction: Vec3,
    /// Shutter time for motion blur.
    time: f32,
    /// Wavelength in nanometers. 0.0 means full spectrum (white).
    wavelength: f32,
}

impl Ray {
    /// Create a new ray. The direction is normalized internally.
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3, time: f32) -> Self {
        Self::with_wavelength(origin, direction, time, 0.0)
    }

    /// Create a ray carrying a specific wavelength (nm).
    #[inline]
    pub fn with_wavelength(origin: Vec3, direction: Vec3, time: f32, wavelength: f32) -> Self {
        let direction = direction.normalize();
        Self {
            origin,
            direction,
            inv_direction: direction.recip(),
            time,
            wavelength,
        }
    }

    /// Create a ray at time 0 with no wavelength.
    #[inline]
    pub fn new_simple(origin: Vec3, direction: Vec3) -> Self {
        Self::new(origin, direction, 0.0)
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    #[inline]
    pub fn inv_direction(&self) -> Vec3 {
        self.inv_direction
    }

    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    pub fn wavelength(&self) -> f32 {
        self.wavelength
    }

    /// Compute a point along the ray: P(t) = origin + t * direction.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + t * self.direction
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self::new_simple(Vec3::ZERO, Vec3::Z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_at() {
        let ray = Ray::new_simple(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));

        // Direction is normalized, so at(t) walks unit steps.
        assert_eq!(ray.at(0.0), Vec3::ZERO);
        assert_eq!(ray.at(1.0), Vec3::X);
        assert_eq!(ray.at(2.5), Vec3::new(2.5, 0.0, 0.0));
    }

    #[test]
    fn test_ray_inverse_direction() {
        let ray = Ray::new_simple(Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0));
        assert!((ray.inv_direction().y - 1.0).abs() < 1e-6);
        // Zero components invert to infinity; the slab test relies on this.
        assert!(ray.inv_direction().x.is_infinite());
        assert!(ray.inv_direction().z.is_infinite());
    }

    #[test]
    fn test_ray_wavelength() {
        let ray = Ray::with_wavelength(Vec3::ZERO, Vec3::X, 0.3, 550.0);
        assert_eq!(ray.wavelength(), 550.0);
        assert_eq!(ray.time(), 0.3);
        // Default rays are full-spectrum.
        assert_eq!(Ray::default().wavelength(), 0.0);
    }
}
