//! Sphere primitives, static and moving.

use std::f32::consts::PI;
use std::sync::Arc;

use prisma_math::sampling::{random_f32, random_range, random_unit_vector};
use prisma_math::{get_sphere_uv, Aabb, Interval, Onb, Ray, Vec3, EPSILON, SHADOW_EPSILON};

use crate::hittable::{HitRecord, Hittable, SurfaceSample};
use crate::material::Material;

/// A sphere defined by a center and a radius.
pub struct Sphere {
    center: Vec3,
    radius: f32,
    material: Arc<dyn Material>,
    light_id: Option<usize>,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32, material: Arc<dyn Material>) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            material,
            light_id: None,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}

impl Hittable for Sphere {
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord<'a>) -> bool {
        let oc = (ray.origin() - self.center).as_dvec3();
        let dir = ray.direction().as_dvec3();

        // Double precision quadratic: avoids striping artifacts on large
        // spheres used as ground planes.
        let a = dir.dot(dir);
        let half_b = oc.dot(dir);
        let c = oc.dot(oc) - (self.radius as f64) * (self.radius as f64);

        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            return false;
        }
        let sqrtd = discriminant.sqrt();

        let mut root = (-half_b - sqrtd) / a;
        if !ray_t.surrounds(root as f32) {
            root = (-half_b + sqrtd) / a;
            if !ray_t.surrounds(root as f32) {
                return false;
            }
        }

        rec.t = root as f32;
        rec.p = ray.at(rec.t);

        let outward_normal = (rec.p - self.center) / self.radius;
        rec.set_face_normal(ray, outward_normal);
        (rec.u, rec.v) = get_sphere_uv(outward_normal);

        // Tangent follows increasing U (longitude around Y); at the poles
        // any horizontal axis serves.
        rec.tangent = if outward_normal.y.abs() > 0.999 {
            Vec3::X
        } else {
            Vec3::Y.cross(outward_normal).normalize()
        };

        rec.material = self.material.as_ref();
        rec.object = Some(self);
        true
    }

    fn bounding_box(&self, _time0: f32, _time1: f32) -> Option<Aabb> {
        let rvec = Vec3::splat(self.radius);
        Some(Aabb::from_points(self.center - rvec, self.center + rvec))
    }

    /// Solid-angle density of sampling a direction towards the sphere.
    fn pdf_value(&self, origin: Vec3, v: Vec3) -> f32 {
        let mut rec = HitRecord::default();
        let probe = Ray::new_simple(origin, v);
        if !self.hit(&probe, Interval::new(SHADOW_EPSILON, f32::INFINITY), &mut rec) {
            return 0.0;
        }

        let direction = self.center - origin;
        let dist_squared = direction.length_squared();
        let radius_squared = self.radius * self.radius;

        if dist_squared <= radius_squared {
            // Origin inside the sphere: no meaningful cone.
            return 0.0;
        }

        let sin_theta_sq = radius_squared / dist_squared;
        let solid_angle = if sin_theta_sq < 1e-4 {
            // Taylor expansion of 2pi (1 - sqrt(1 - x)) for small x
            // preserves precision for distant spheres.
            2.0 * PI * (0.5 * sin_theta_sq + 0.125 * sin_theta_sq * sin_theta_sq)
        } else {
            let cos_theta_max = (1.0 - sin_theta_sq).sqrt();
            2.0 * PI * (1.0 - cos_theta_max)
        };

        if solid_angle < EPSILON {
            return 0.0;
        }
        1.0 / solid_angle
    }

    /// Sample the cone subtended by the sphere, returning a vector whose
    /// length is the exact distance to the near intersection.
    fn random_pointing_vector(&self, origin: Vec3) -> Vec3 {
        let direction = self.center - origin;
        let dist_squared = direction.length_squared();

        if dist_squared <= self.radius * self.radius {
            // Inside the sphere: degenerate but safe.
            return direction;
        }

        let uvw = Onb::from_normal(direction);

        let r1 = random_f32();
        let r2 = random_f32();
        let cos_theta_max = (1.0 - self.radius * self.radius / dist_squared).sqrt();

        // cos(theta) uniform in [cos_theta_max, 1]
        let z = 1.0 + r2 * (cos_theta_max - 1.0);
        let phi = 2.0 * PI * r1;
        let sin_theta = (1.0 - z * z).max(0.0).sqrt();

        let ray_dir = uvw
            .local(Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, z))
            .normalize();

        // Walk the sampled direction to the entry point of the sphere.
        let oc = origin - self.center;
        let b = oc.dot(ray_dir);
        let c = oc.length_squared() - self.radius * self.radius;
        let discriminant = (b * b - c).max(0.0);
        let t = -b - discriminant.sqrt();

        ray_dir * t
    }

    fn sample_surface(&self) -> Option<SurfaceSample> {
        let normal = random_unit_vector();
        Some(SurfaceSample {
            position: self.center + normal * self.radius,
            normal,
            area: 4.0 * PI * self.radius * self.radius,
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

/// A sphere whose center translates linearly over the shutter interval.
pub struct MovingSphere {
    center0: Vec3,
    center1: Vec3,
    time0: f32,
    time1: f32,
    radius: f32,
    material: Arc<dyn Material>,
    light_id: Option<usize>,
}

impl MovingSphere {
    pub fn new(
        center0: Vec3,
        center1: Vec3,
        time0: f32,
        time1: f32,
        radius: f32,
        material: Arc<dyn Material>,
    ) -> Self {
        Self {
            center0,
            center1,
            time0,
            time1,
            radius,
            material,
            light_id: None,
        }
    }

    pub fn center_at(&self, time: f32) -> Vec3 {
        self.center0 + ((time - self.time0) / (self.time1 - self.time0)) * (self.center1 - self.center0)
    }
}

impl Hittable for MovingSphere {
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord<'a>) -> bool {
        let center = self.center_at(ray.time());
        let oc = ray.origin() - center;

        let a = ray.direction().length_squared();
        let half_b = oc.dot(ray.direction());
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            return false;
        }
        let sqrtd = discriminant.sqrt();

        let mut root = (-half_b - sqrtd) / a;
        if !ray_t.surrounds(root) {
            root = (-half_b + sqrtd) / a;
            if !ray_t.surrounds(root) {
                return false;
            }
        }

        rec.t = root;
        rec.p = ray.at(rec.t);

        let outward_normal = (rec.p - center) / self.radius;
        rec.set_face_normal(ray, outward_normal);
        (rec.u, rec.v) = get_sphere_uv(outward_normal);
        rec.tangent = if outward_normal.y.abs() > 0.999 {
            Vec3::X
        } else {
            Vec3::Y.cross(outward_normal).normalize()
        };

        rec.material = self.material.as_ref();
        rec.object = Some(self);
        true
    }

    fn bounding_box(&self, time0: f32, time1: f32) -> Option<Aabb> {
        let rvec = Vec3::splat(self.radius);
        let box0 = Aabb::from_points(self.center_at(time0) - rvec, self.center_at(time0) + rvec);
        let box1 = Aabb::from_points(self.center_at(time1) - rvec, self.center_at(time1) + rvec);
        Some(Aabb::surrounding(&box0, &box1))
    }

    fn sample_surface(&self) -> Option<SurfaceSample> {
        let normal = random_unit_vector();
        let time = random_range(self.time0, self.time1);
        Some(SurfaceSample {
            position: self.center_at(time) + normal * self.radius,
            normal,
            area: 4.0 * PI * self.radius * self.radius,
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
