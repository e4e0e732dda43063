//! Homogeneous participating medium bounded by another object.
//!
//! The ray enters the boundary at t1 and leaves at t2; a scattering
//! distance is drawn from the Beer-Lambert free-flight distribution and if
//! it falls inside [t1, t2] the ray "hits" a particle of the medium.

use std::sync::Arc;

use prisma_core::Texture;
use prisma_math::sampling::random_f32;
use prisma_math::{Aabb, Interval, Ray, Vec3, SHADOW_EPSILON};

use crate::hittable::{HitRecord, Hittable, SurfaceSample};
use crate::material::{Color, Isotropic, Material};

pub struct ConstantMedium {
    boundary: Arc<dyn Hittable>,
    phase_function: Isotropic,
    neg_inv_density: f32,
}

impl ConstantMedium {
    pub fn new(boundary: Arc<dyn Hittable>, density: f32, color: Color) -> Self {
        Self {
            boundary,
            phase_function: Isotropic::new(color),
            neg_inv_density: -1.0 / density,
        }
    }

    pub fn from_texture(boundary: Arc<dyn Hittable>, density: f32, albedo: Arc<dyn Texture>) -> Self {
        Self {
            boundary,
            phase_function: Isotropic::from_texture(albedo),
            neg_inv_density: -1.0 / density,
        }
    }

    /// A glowing medium (emissive isotropic phase function).
    pub fn emissive(boundary: Arc<dyn Hittable>, density: f32, color: Color, emit: Color) -> Self {
        Self {
            boundary,
            phase_function: Isotropic::emissive(color, emit),
            neg_inv_density: -1.0 / density,
        }
    }
}

impl Hittable for ConstantMedium {
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord<'a>) -> bool {
        // Entry point; the unbounded range also catches rays starting inside.
        let mut rec1 = HitRecord::default();
        if !self
            .boundary
            .hit(ray, Interval::UNIVERSE, &mut rec1)
        {
            return false;
        }

        // Exit point, strictly after the entry.
        let mut rec2 = HitRecord::default();
        if !self.boundary.hit(
            ray,
            Interval::new(rec1.t + SHADOW_EPSILON, f32::INFINITY),
            &mut rec2,
        ) {
            return false;
        }

        let mut t1 = rec1.t.max(ray_t.min);
        let t2 = rec2.t.min(ray_t.max);
        if t1 >= t2 {
            return false;
        }
        if t1 < 0.0 {
            t1 = 0.0;
        }

        // Ray directions are unit length, so t already measures distance.
        let distance_inside = t2 - t1;
        let hit_distance = self.neg_inv_density * random_f32().max(f32::MIN_POSITIVE).ln();

        if hit_distance > distance_inside {
            return false; // passed through without scattering
        }

        rec.t = t1 + hit_distance;
        rec.p = ray.at(rec.t);

        // Scattering is isotropic; the normal is arbitrary.
        rec.normal = Vec3::X;
        rec.front_face = true;
        rec.tangent = Vec3::Y;

        rec.material = &self.phase_function;
        rec.object = Some(self);
        true
    }

    fn bounding_box(&self, time0: f32, time1: f32) -> Option<Aabb> {
        self.boundary.bounding_box(time0, time1)
    }

    fn pdf_value(&self, origin: Vec3, v: Vec3) -> f32 {
        self.boundary.pdf_value(origin, v)
    }

    fn random_pointing_vector(&self, origin: Vec3) -> Vec3 {
        self.boundary.random_pointing_vector(origin)
    }

    fn sample_surface(&self) -> Option<SurfaceSample> {
        self.boundary.sample_surface()
    }

    fn material(&self) -> Option<&dyn Material> {
        Some(&self.phase_function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sphere::Sphere;
    use crate::material::Lambertian;

    fn foggy_sphere(density: f32) -> ConstantMedium {
        let boundary = Arc::new(Sphere::new(
            Vec3::ZERO,
            1.0,
            Arc::new(Lambertian::new(Vec3::ONE)),
        ));
        ConstantMedium::new(boundary, density, Color::splat(0.8))
    }

    #[test]
    fn test_dense_medium_always_scatters() {
        let medium = foggy_sphere(1e6);
        let ray = Ray::new_simple(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);

        for _ in 0..50 {
            let mut rec = HitRecord::default();
            assert!(medium.hit(&ray, Interval::new(0.001, f32::INFINITY), &mut rec));
            // Scatters almost exactly at the entry point.
            assert!((rec.t - 4.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_thin_medium_mostly_passes() {
        let medium = foggy_sphere(1e-6);
        let ray = Ray::new_simple(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);

        let mut hits = 0;
        for _ in 0..200 {
            let mut rec = HitRecord::default();
            if medium.hit(&ray, Interval::new(0.001, f32::INFINITY), &mut rec) {
                hits += 1;
            }
        }
        assert!(hits < 5, "thin fog scattered {hits}/200 rays");
    }

    #[test]
    fn test_scatter_point_is_inside_boundary() {
        let medium = foggy_sphere(2.0);
        let ray = Ray::new_simple(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);

        for _ in 0..200 {
            let mut rec = HitRecord::default();
            if medium.hit(&ray, Interval::new(0.001, f32::INFINITY), &mut rec) {
                assert!(rec.p.length() <= 1.0 + 1e-3);
            }
        }
    }

    #[test]
    fn test_ray_starting_inside() {
        let medium = foggy_sphere(1e6);
        let ray = Ray::new_simple(Vec3::ZERO, Vec3::X);
        let mut rec = HitRecord::default();
        assert!(medium.hit(&ray, Interval::new(0.001, f32::INFINITY), &mut rec));
        assert!(rec.t >= 0.0);
        assert!(rec.p.length() <= 1.0 + 1e-3);
    }
}
