//! Triangle primitive with UV mapping and optional smooth shading.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use prisma_math::sampling::random_f32;
use prisma_math::{Aabb, Interval, Ray, Vec2, Vec3, EPSILON, PADDING_EPSILON, SHADOW_EPSILON};

use crate::hittable::{HitRecord, Hittable, SurfaceSample};
use crate::material::Material;

/// A triangle with per-vertex UVs and optional per-vertex normals.
pub struct Triangle {
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    n0: Vec3,
    n1: Vec3,
    n2: Vec3,
    uv0: Vec2,
    uv1: Vec2,
    uv2: Vec2,
    face_normal: Vec3,
    tangent: Vec3,
    area: f32,
    material: Arc<dyn Material>,
    use_vertex_normals: bool,
    /// usize::MAX means "not a light". Atomic so a mesh can stamp its
    /// triangles after they are shared with the internal BVH.
    light_id: AtomicUsize,
}

impl Triangle {
    /// Flat-shaded triangle; the geometric normal is used everywhere.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, material: Arc<dyn Material>) -> Self {
        Self::with_uvs(
            v0,
            v1,
            v2,
            material,
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
        )
    }

    pub fn with_uvs(
        v0: Vec3,
        v1: Vec3,
        v2: Vec3,
        material: Arc<dyn Material>,
        uv0: Vec2,
        uv1: Vec2,
        uv2: Vec2,
    ) -> Self {
        let (face_normal, tangent, area) = Self::derive(v0, v1, v2, uv0, uv1, uv2);
        Self {
            v0,
            v1,
            v2,
            n0: face_normal,
            n1: face_normal,
            n2: face_normal,
            uv0,
            uv1,
            uv2,
            face_normal,
            tangent,
            area,
            material,
            use_vertex_normals: false,
            light_id: AtomicUsize::new(usize::MAX),
        }
    }

    /// Smooth-shaded triangle interpolating the given vertex normals.
    #[allow(clippy::too_many_arguments)]
    pub fn smooth(
        v0: Vec3,
        v1: Vec3,
        v2: Vec3,
        n0: Vec3,
        n1: Vec3,
        n2: Vec3,
        material: Arc<dyn Material>,
        uv0: Vec2,
        uv1: Vec2,
        uv2: Vec2,
    ) -> Self {
        let (face_normal, tangent, area) = Self::derive(v0, v1, v2, uv0, uv1, uv2);
        Self {
            v0,
            v1,
            v2,
            n0,
            n1,
            n2,
            uv0,
            uv1,
            uv2,
            face_normal,
            tangent,
            area,
            material,
            use_vertex_normals: true,
            light_id: AtomicUsize::new(usize::MAX),
        }
    }

    fn derive(v0: Vec3, v1: Vec3, v2: Vec3, uv0: Vec2, uv1: Vec2, uv2: Vec2) -> (Vec3, Vec3, f32) {
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let cross = edge1.cross(edge2);
        let face_normal = cross.normalize();
        let area = 0.5 * cross.length();

        // Tangent from the UV gradient, for normal mapping.
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;
        let f = 1.0 / (delta_uv1.x * delta_uv2.y - delta_uv2.x * delta_uv1.y + EPSILON);
        let tangent = (f * (delta_uv2.y * edge1 - delta_uv1.y * edge2)).normalize();

        (face_normal, tangent, area)
    }

    pub fn area(&self) -> f32 {
        self.area
    }

    fn sample_point(&self) -> Vec3 {
        // sqrt mapping gives a uniform density over the triangle.
        let sqrt_r1 = random_f32().sqrt();
        let r2 = random_f32();
        let u = 1.0 - sqrt_r1;
        let v = r2 * sqrt_r1;
        (1.0 - u - v) * self.v0 + u * self.v1 + v * self.v2
    }
}

impl Hittable for Triangle {
    /// Möller-Trumbore ray-triangle intersection.
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord<'a>) -> bool {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let pvec = ray.direction().cross(edge2);
        let det = edge1.dot(pvec);

        // Parallel or degenerate
        if det.abs() < EPSILON {
            return false;
        }

        let inv_det = 1.0 / det;
        let tvec = ray.origin() - self.v0;

        let u = tvec.dot(pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return false;
        }

        let qvec = tvec.cross(edge1);
        let v = ray.direction().dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return false;
        }

        let t = edge2.dot(qvec) * inv_det;
        if !ray_t.surrounds(t) {
            return false;
        }

        rec.t = t;
        rec.p = ray.at(t);

        let w = 1.0 - u - v;
        let shading_normal = if self.use_vertex_normals {
            (w * self.n0 + u * self.n1 + v * self.n2).normalize()
        } else {
            self.face_normal
        };
        rec.set_face_normal(ray, shading_normal);

        rec.u = w * self.uv0.x + u * self.uv1.x + v * self.uv2.x;
        rec.v = w * self.uv0.y + u * self.uv1.y + v * self.uv2.y;
        rec.tangent = self.tangent;

        rec.material = self.material.as_ref();
        rec.object = Some(self);
        true
    }

    fn bounding_box(&self, _time0: f32, _time1: f32) -> Option<Aabb> {
        let min = self.v0.min(self.v1).min(self.v2) - Vec3::splat(PADDING_EPSILON);
        let max = self.v0.max(self.v1).max(self.v2) + Vec3::splat(PADDING_EPSILON);
        Some(Aabb::from_points(min, max))
    }

    /// Solid-angle density: distance^2 / (area * cos(theta)).
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
        distance_squared / (self.area * cosine)
    }

    fn random_pointing_vector(&self, origin: Vec3) -> Vec3 {
        self.sample_point() - origin
    }

    fn sample_surface(&self) -> Option<SurfaceSample> {
        Some(SurfaceSample {
            position: self.sample_point(),
            normal: self.face_normal,
            area: self.area,
        })
    }

    fn material(&self) -> Option<&dyn Material> {
        Some(self.material.as_ref())
    }

    fn light_id(&self) -> Option<usize> {
        match self.light_id.load(Ordering::Relaxed) {
            usize::MAX => None,
            id => Some(id),
        }
    }

    fn set_light_id(&mut self, id: usize) {
        self.store_light_id(id);
    }
}

impl Triangle {
    /// Stamp the light index through a shared reference; meshes call this
    /// for triangles already held by their internal BVH.
    pub(crate) fn store_light_id(&self, id: usize) {
        self.light_id.store(id, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Lambertian;

    fn test_triangle() -> Triangle {
        Triangle::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(0.0, 1.0, -1.0),
            Arc::new(Lambertian::new(Vec3::splat(0.5))),
        )
    }

    #[test]
    fn test_triangle_hit() {
        let tri = test_triangle();
        let ray = Ray::new_simple(Vec3::ZERO, Vec3::NEG_Z);
        let mut rec = HitRecord::default();

        assert!(tri.hit(&ray, Interval::new(0.001, f32::INFINITY), &mut rec));
        assert!((rec.t - 1.0).abs() < 1e-4);
        assert!((rec.normal.z.abs() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_triangle_miss() {
        let tri = test_triangle();
        let ray = Ray::new_simple(Vec3::ZERO, Vec3::Z);
        let mut rec = HitRecord::default();
        assert!(!tri.hit(&ray, Interval::new(0.001, f32::INFINITY), &mut rec));

        // Inside the plane but outside the triangle
        let ray = Ray::new_simple(Vec3::new(5.0, 5.0, 0.0), Vec3::NEG_Z);
        assert!(!tri.hit(&ray, Interval::new(0.001, f32::INFINITY), &mut rec));
    }

    #[test]
    fn test_triangle_area() {
        let tri = Triangle::new(
            Vec3::ZERO,
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
            Arc::new(Lambertian::new(Vec3::ONE)),
        );
        assert!((tri.area() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_triangle_samples_lie_on_surface() {
        let tri = test_triangle();
        for _ in 0..200 {
            let s = tri.sample_surface().unwrap();
            // On the z = -1 plane and inside the triangle bounds
            assert!((s.position.z + 1.0).abs() < 1e-5);
            assert!(s.position.x >= -1.0 && s.position.x <= 1.0);
            assert!(s.position.y >= -1.0 && s.position.y <= 1.0);
            assert_eq!(s.area, tri.area());
        }
    }

    #[test]
    fn test_triangle_pdf_value() {
        // Triangle of area 2 seen head on from distance 1:
        // pdf = d^2 / (A cos) = 1 / 2.
        let tri = Triangle::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(0.0, 1.0, -1.0),
            Arc::new(Lambertian::new(Vec3::ONE)),
        );
        let pdf = tri.pdf_value(Vec3::ZERO, Vec3::NEG_Z);
        assert!((pdf - 1.0 / tri.area()).abs() < 1e-4);
    }

    #[test]
    fn test_smooth_triangle_interpolates_normals() {
        let n_left = Vec3::new(-1.0, 0.0, 1.0).normalize();
        let n_right = Vec3::new(1.0, 0.0, 1.0).normalize();
        let tri = Triangle::smooth(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(0.0, 1.0, -1.0),
            n_left,
            n_right,
            Vec3::Z,
            Arc::new(Lambertian::new(Vec3::ONE)),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
        );

        // Hitting near the apex leans towards its normal.
        let ray = Ray::new_simple(Vec3::new(0.0, 0.8, 0.0), Vec3::NEG_Z);
        let mut rec = HitRecord::default();
        assert!(tri.hit(&ray, Interval::new(0.001, f32::INFINITY), &mut rec));
        assert!((rec.normal - Vec3::Z).length() < 0.3);

        // Hitting near the left corner leans left.
        let ray = Ray::new_simple(Vec3::new(-0.9, -0.9, 0.0), Vec3::NEG_Z);
        let mut rec = HitRecord::default();
        assert!(tri.hit(&ray, Interval::new(0.001, f32::INFINITY), &mut rec));
        assert!(rec.normal.x < -0.3);
    }

    #[test]
    fn test_triangle_bounding_box_is_padded() {
        let tri = test_triangle();
        let bbox = tri.bounding_box(0.0, 1.0).unwrap();
        // Flat in z: padding keeps the box non-degenerate.
        assert!(bbox.max.z > bbox.min.z);
    }
}
