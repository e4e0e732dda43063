//! Hittable trait and HitRecord for ray-object intersection.

use prisma_math::{Aabb, Interval, Ray, Vec3};

use crate::material::{Material, ScatterRecord};

/// A dummy material used for HitRecord::default().
/// Always absorbs light (returns None from scatter).
struct DummyMaterial;

impl Material for DummyMaterial {
    fn scatter(&self, _ray_in: &Ray, _rec: &HitRecord) -> Option<ScatterRecord> {
        None
    }
}

static DUMMY_MATERIAL: DummyMaterial = DummyMaterial;

/// Record of a ray-object intersection.
///
/// Holds only borrowed references into the scene graph; a hit never
/// outlives the intersection query that produced it.
#[derive(Clone)]
pub struct HitRecord<'a> {
    /// Point of intersection in world space
    pub p: Vec3,
    /// Surface normal at the intersection (always points against the ray)
    pub normal: Vec3,
    /// Geometric tangent, aligned with increasing U
    pub tangent: Vec3,
    /// Material at the intersection point
    pub material: &'a dyn Material,
    /// The object that was hit; used for light identification and MIS
    pub object: Option<&'a dyn Hittable>,
    /// Ray parameter t where the intersection occurred
    pub t: f32,
    /// Texture coordinates in [0, 1]
    pub u: f32,
    pub v: f32,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
}

impl<'a> Default for HitRecord<'a> {
    fn default() -> Self {
        Self {
            p: Vec3::ZERO,
            normal: Vec3::ZERO,
            tangent: Vec3::X,
            material: &DUMMY_MATERIAL,
            object: None,
            t: 0.0,
            u: 0.0,
            v: 0.0,
            front_face: false,
        }
    }
}

impl<'a> HitRecord<'a> {
    /// Set the shading normal from the geometric outward normal.
    ///
    /// The stored normal always points against the incoming ray;
    /// `front_face` records which side was hit.
    pub fn set_face_normal(&mut self, ray: &Ray, outward_normal: Vec3) {
        self.front_face = ray.direction().dot(outward_normal) < 0.0;
        self.normal = if self.front_face {
            outward_normal
        } else {
            -outward_normal
        };
    }

    /// Light list index of the hit object, if it was promoted to a light.
    pub fn light_id(&self) -> Option<usize> {
        self.object.and_then(|o| o.light_id())
    }
}

/// A point sampled on an object's surface, for area light emission.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceSample {
    pub position: Vec3,
    pub normal: Vec3,
    /// Total surface area of the object.
    pub area: f32,
}

/// Polymorphic scene geometry.
///
/// Beyond intersection, objects expose the sampling operations needed by
/// area lights: uniform surface sampling, solid-angle-importance direction
/// sampling towards the object, and the matching density.
pub trait Hittable: Send + Sync {
    /// Test if a ray hits this object within the given interval.
    ///
    /// Returns true if hit, and fills in the hit record.
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord<'a>) -> bool;

    /// Bounding box over the shutter interval. None for unbounded objects.
    fn bounding_box(&self, time0: f32, time1: f32) -> Option<Aabb>;

    /// Solid-angle density of sampling direction `v` from `origin` towards
    /// this object. Consistent with `random_pointing_vector` under the
    /// area-to-solid-angle change of variables.
    fn pdf_value(&self, _origin: Vec3, _v: Vec3) -> f32 {
        0.0
    }

    /// A vector from `origin` to a sampled point on this object.
    ///
    /// The length of the returned vector is the distance to the surface
    /// point, so callers can derive both direction and range.
    fn random_pointing_vector(&self, _origin: Vec3) -> Vec3 {
        Vec3::X
    }

    /// Uniformly sample a point on the surface.
    fn sample_surface(&self) -> Option<SurfaceSample> {
        None
    }

    /// Material of this object, if it has one (aggregates may not).
    fn material(&self) -> Option<&dyn Material> {
        None
    }

    /// Index in the scene's light list, if this object is an area light.
    fn light_id(&self) -> Option<usize> {
        None
    }

    /// Assign the light index. Called by the scene during promotion;
    /// aggregates propagate it to their children.
    fn set_light_id(&mut self, _id: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_face_normal() {
        let mut rec = HitRecord::default();
        let outward = Vec3::Y;

        // Ray travelling downwards hits the front face.
        let ray = Ray::new_simple(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Y);
        rec.set_face_normal(&ray, outward);
        assert!(rec.front_face);
        assert_eq!(rec.normal, Vec3::Y);

        // Ray travelling upwards hits the back face; normal flips.
        let ray = Ray::new_simple(Vec3::new(0.0, -1.0, 0.0), Vec3::Y);
        rec.set_face_normal(&ray, outward);
        assert!(!rec.front_face);
        assert_eq!(rec.normal, Vec3::NEG_Y);
    }

    #[test]
    fn test_default_record_absorbs() {
        let rec = HitRecord::default();
        let ray = Ray::new_simple(Vec3::ZERO, Vec3::Z);
        assert!(rec.material.scatter(&ray, &rec).is_none());
        assert!(rec.light_id().is_none());
    }
}
