//! Cone primitive aligned with the Y axis.
//!
//! The cone tapers from a base disk of the given radius at `center.y` to a
//! point at `center.y + height`.

use std::f32::consts::PI;
use std::sync::Arc;

use prisma_math::sampling::{random_f32, random_in_unit_disk};
use prisma_math::{Aabb, Interval, Ray, Vec3, EPSILON, SHADOW_EPSILON};

use crate::hittable::{HitRecord, Hittable, SurfaceSample};
use crate::material::Material;

pub struct Cone {
    /// Center of the base disk
    center: Vec3,
    radius: f32,
    height: f32,
    material: Arc<dyn Material>,
    area: f32,
    base_area_ratio: f32,
    light_id: Option<usize>,
}

impl Cone {
    pub fn new(center: Vec3, radius: f32, height: f32, material: Arc<dyn Material>) -> Self {
        let slant_height = (radius * radius + height * height).sqrt();
        let side_area = PI * radius * slant_height;
        let base_area = PI * radius * radius;
        let area = side_area + base_area;

        Self {
            center,
            radius,
            height,
            material,
            area,
            base_area_ratio: base_area / area,
            light_id: None,
        }
    }

    /// Outward normal of the conical surface at a local point.
    ///
    /// From the gradient of the implicit quadric: horizontal direction
    /// scaled by height, vertical component equal to the base radius.
    fn side_normal(&self, local_p: Vec3) -> Vec3 {
        let mut n = Vec3::new(local_p.x, 0.0, local_p.z);
        if n.length_squared() > 0.0 {
            n = n.normalize();
        }
        n.x *= self.height;
        n.z *= self.height;
        n.y = self.radius;
        n.normalize()
    }
}

impl Hittable for Cone {
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord<'a>) -> bool {
        // Work relative to the base center, in double precision for the
        // quadric solve.
        let o = (ray.origin() - self.center).as_dvec3();
        let d = ray.direction().as_dvec3();

        let k = self.radius as f64 / self.height as f64;
        let k_sq = k * k;
        let h = self.height as f64;

        // Conical surface: x^2 + z^2 = (k (h - y))^2
        let a = d.x * d.x + d.z * d.z - k_sq * d.y * d.y;
        let b = 2.0 * (o.x * d.x + o.z * d.z - k_sq * (o.y - h) * d.y);
        let c = o.x * o.x + o.z * o.z - k_sq * (o.y - h) * (o.y - h);

        let t_min = ray_t.min as f64;
        let mut t_hit = ray_t.max as f64;
        let mut hit_side = false;
        let mut hit_base = false;

        if a.abs() > (EPSILON as f64) * (EPSILON as f64) {
            let discriminant = b * b - 4.0 * a * c;
            if discriminant >= 0.0 {
                let sqrt_d = discriminant.sqrt();
                for t in [(-b - sqrt_d) / (2.0 * a), (-b + sqrt_d) / (2.0 * a)] {
                    if t > t_min && t < t_hit {
                        let y = o.y + t * d.y;
                        if (0.0..=h).contains(&y) {
                            t_hit = t;
                            hit_side = true;
                        }
                    }
                }
            }
        }

        // Base cap on the y = 0 plane
        if d.y.abs() > 1e-8 {
            let t_base = -o.y / d.y;
            if t_base > t_min && t_base < t_hit {
                let x = o.x + t_base * d.x;
                let z = o.z + t_base * d.z;
                if x * x + z * z <= (self.radius as f64) * (self.radius as f64) {
                    t_hit = t_base;
                    hit_base = true;
                    hit_side = false;
                }
            }
        }

        if !hit_side && !hit_base {
            return false;
        }

        rec.t = t_hit as f32;
        rec.p = ray.at(rec.t);
        rec.material = self.material.as_ref();
        rec.object = Some(self);

        let local_p = rec.p - self.center;

        if hit_base {
            rec.set_face_normal(ray, Vec3::NEG_Y);
            // Planar mapping on the cap
            rec.u = (local_p.x / self.radius + 1.0) * 0.5;
            rec.v = (local_p.z / self.radius + 1.0) * 0.5;
            rec.tangent = Vec3::X;
        } else {
            let outward = self.side_normal(local_p);
            rec.set_face_normal(ray, outward);

            // Cylindrical mapping on the flank
            let mut phi = local_p.z.atan2(local_p.x);
            if phi < 0.0 {
                phi += 2.0 * PI;
            }
            rec.u = phi / (2.0 * PI);
            rec.v = local_p.y / self.height;
            rec.tangent = Vec3::Y.cross(rec.normal).normalize();
        }

        true
    }

    fn bounding_box(&self, _time0: f32, _time1: f32) -> Option<Aabb> {
        Some(Aabb::from_points(
            self.center - Vec3::new(self.radius, 0.0, self.radius),
            self.center + Vec3::new(self.radius, self.height, self.radius),
        ))
    }

    fn pdf_value(&self, origin: Vec3, v: Vec3) -> f32 {
        let mut rec = HitRecord::default();
        let probe = Ray::new_simple(origin, v);
        if !self.hit(&probe, Interval::new(SHADOW_EPSILON, f32::INFINITY), &mut rec) {
            return 0.0;
        }

        let distance_squared = rec.t * rec.t;
        let cosine = v.normalize().dot(rec.normal).abs();
        if cosine < 1e-4 {
            return 0.0;
        }
        distance_squared / (cosine * self.area)
    }

    fn random_pointing_vector(&self, origin: Vec3) -> Vec3 {
        match self.sample_surface() {
            Some(sample) => sample.position - origin,
            None => Vec3::X,
        }
    }

    fn sample_surface(&self) -> Option<SurfaceSample> {
        if random_f32() < self.base_area_ratio {
            // Base cap
            let p = random_in_unit_disk() * self.radius;
            Some(SurfaceSample {
                position: self.center + Vec3::new(p.x, 0.0, p.y),
                normal: Vec3::NEG_Y,
                area: self.area,
            })
        } else {
            // Flank. The circumference shrinks linearly towards the tip, so
            // the area element is proportional to the distance from the tip:
            // inverse-CDF sampling gives dist = sqrt(xi) * height.
            let r1 = random_f32();
            let r2 = random_f32();

            let from_tip = r1.sqrt() * self.height;
            let y_local = self.height - from_tip;
            let r_at_y = (from_tip / self.height) * self.radius;
            let phi = 2.0 * PI * r2;

            let local = Vec3::new(phi.cos() * r_at_y, y_local, phi.sin() * r_at_y);
            Some(SurfaceSample {
                position: self.center + local,
                normal: self.side_normal(local),
                area: self.area,
            })
        }
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
