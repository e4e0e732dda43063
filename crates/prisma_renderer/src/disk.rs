//! Disk primitive: a flat circle defined by center, normal and radius.

use std::f32::consts::PI;
use std::sync::Arc;

use prisma_math::sampling::random_f32;
use prisma_math::{Aabb, Interval, Onb, Ray, Vec3, EPSILON, SHADOW_EPSILON};

use crate::hittable::{HitRecord, Hittable, SurfaceSample};
use crate::material::Material;

pub struct Disk {
    center: Vec3,
    normal: Vec3,
    radius: f32,
    material: Arc<dyn Material>,
    light_id: Option<usize>,
}

impl Disk {
    pub fn new(center: Vec3, normal: Vec3, radius: f32, material: Arc<dyn Material>) -> Self {
        Self {
            center,
            normal: normal.normalize(),
            radius,
            material,
            light_id: None,
        }
    }

    fn area(&self) -> f32 {
        PI * self.radius * self.radius
    }

    /// Uniform point on the disk surface.
    fn sample_point(&self) -> Vec3 {
        let r1 = random_f32();
        let r2 = random_f32();

        // sqrt for uniform density over the area
        let r = self.radius * r2.sqrt();
        let phi = 2.0 * PI * r1;

        let uvw = Onb::from_normal(self.normal);
        self.center + uvw.local(Vec3::new(r * phi.cos(), r * phi.sin(), 0.0))
    }
}

impl Hittable for Disk {
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord<'a>) -> bool {
        let denom = self.normal.dot(ray.direction());

        // Parallel to the plane
        if denom.abs() < EPSILON {
            return false;
        }

        let t = (self.center - ray.origin()).dot(self.normal) / denom;
        if !ray_t.surrounds(t) {
            return false;
        }

        let p = ray.at(t);
        let v = p - self.center;
        let dist_squared = v.length_squared();
        if dist_squared > self.radius * self.radius {
            return false;
        }

        rec.t = t;
        rec.p = p;
        rec.set_face_normal(ray, self.normal);

        // Polar UV mapping: u from center to rim, v around the circle.
        let uvw = Onb::from_normal(self.normal);
        let x = v.dot(uvw.u);
        let y = v.dot(uvw.v);

        rec.u = dist_squared.sqrt() / self.radius;
        let mut phi = y.atan2(x);
        if phi < 0.0 {
            phi += 2.0 * PI;
        }
        rec.v = phi / (2.0 * PI);
        rec.tangent = uvw.u;

        rec.material = self.material.as_ref();
        rec.object = Some(self);
        true
    }

    fn bounding_box(&self, _time0: f32, _time1: f32) -> Option<Aabb> {
        // Exact extent per axis: r * sqrt(1 - n_i^2); axes aligned with the
        // normal get only the epsilon padding applied by Aabb.
        let e = Vec3::new(
            self.radius * (1.0 - self.normal.x * self.normal.x).max(0.0).sqrt(),
            self.radius * (1.0 - self.normal.y * self.normal.y).max(0.0).sqrt(),
            self.radius * (1.0 - self.normal.z * self.normal.z).max(0.0).sqrt(),
        );
        Some(Aabb::from_points(self.center - e, self.center + e))
    }

    fn pdf_value(&self, origin: Vec3, v: Vec3) -> f32 {
        let mut rec = HitRecord::default();
        let probe = Ray::new_simple(origin, v);
        if !self.hit(&probe, Interval::new(SHADOW_EPSILON, f32::INFINITY), &mut rec) {
            return 0.0;
        }

        let distance_squared = rec.t * rec.t;
        let cosine = v.normalize().dot(rec.normal).abs();
        if cosine < EPSILON {
            return 0.0;
        }
        distance_squared / (cosine * self.area())
    }

    fn random_pointing_vector(&self, origin: Vec3) -> Vec3 {
        self.sample_point() - origin
    }

    fn sample_surface(&self) -> Option<SurfaceSample> {
        Some(SurfaceSample {
            position: self.sample_point(),
            normal: self.normal,
            area: self.area(),
        })
    }

    fn material(&self) -> Option<&dyn Material> {
        Some(self.material.as_ref())
    }

    fn light_id(&self) -> Option<usize> {
        self.light_id
    }

    fn set_light_id(&mut self, id: usize) {
        self.light_id = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Lambertian;

    fn test_disk() -> Disk {
        Disk::new(
            Vec3::new(0.0, 0.0, -2.0),
            Vec3::Z,
            1.0,
            Arc::new(Lambertian::new(Vec3::splat(0.5))),
        )
    }

    #[test]
    fn test_disk_hit_inside_radius() {
        let disk = test_disk();
        let mut rec = HitRecord::default();

        let ray = Ray::new_simple(Vec3::ZERO, Vec3::NEG_Z);
        assert!(disk.hit(&ray, Interval::new(0.001, f32::INFINITY), &mut rec));
        assert!((rec.t - 2.0).abs() < 1e-4);
        assert!(rec.u < 0.01); // dead center

        // Beyond the rim
        let ray = Ray::new_simple(Vec3::new(1.5, 0.0, 0.0), Vec3::NEG_Z);
        assert!(!disk.hit(&ray, Interval::new(0.001, f32::INFINITY), &mut rec));
    }

    #[test]
    fn test_disk_parallel_ray_misses() {
        let disk = test_disk();
        let mut rec = HitRecord::default();
        let ray = Ray::new_simple(Vec3::new(0.0, 5.0, -2.0), Vec3::X);
        assert!(!disk.hit(&ray, Interval::new(0.001, f32::INFINITY), &mut rec));
    }

    #[test]
    fn test_disk_bounding_box_thin_axis() {
        let disk = test_disk();
        let bbox = disk.bounding_box(0.0, 1.0).unwrap();
        // Wide in x/y, thin (but padded) in z.
        assert!(bbox.max.x - bbox.min.x >= 2.0);
        assert!(bbox.max.z - bbox.min.z < 0.01);
        assert!(bbox.max.z > bbox.min.z);
    }

    #[test]
    fn test_disk_samples_on_surface() {
        let disk = test_disk();
        for _ in 0..200 {
            let s = disk.sample_surface().unwrap();
            assert!((s.position.z + 2.0).abs() < 1e-5);
            assert!((s.position - Vec3::new(0.0, 0.0, -2.0)).length() <= 1.0 + 1e-4);
            assert!((s.area - PI).abs() < 1e-4);
        }
    }

    #[test]
    fn test_disk_pdf_head_on() {
        // Unit disk seen head on from distance 2: pdf = 4 / (pi * 1).
        let disk = test_disk();
        let pdf = disk.pdf_value(Vec3::ZERO, Vec3::NEG_Z);
        assert!((pdf - 4.0 / PI).abs() < 1e-3);
    }
}
