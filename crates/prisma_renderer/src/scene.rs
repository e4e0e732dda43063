//! Scene: object and light registry, BVH owner, shadow transmittance.

use std::sync::Arc;

use prisma_core::{Distribution1D, ImageTexture, Texture};
use prisma_math::{near_zero, Interval, Ray, Vec3, EPSILON, SHADOW_EPSILON};

use crate::bvh::BvhNode;
use crate::hittable::{HitRecord, Hittable};
use crate::light::{DiffuseAreaLight, EnvironmentLight, Light};

/// A container for everything renderable.
///
/// Objects whose material emits light are automatically promoted to area
/// lights on `add`, so explicit sampling and BSDF sampling agree on which
/// emitters exist. The environment light, when present, is appended at the
/// end of the power-weighted light selection distribution.
pub struct Scene {
    pub objects: Vec<Arc<dyn Hittable>>,
    pub lights: Vec<Arc<dyn Light>>,
    pub env_light: Option<Arc<EnvironmentLight>>,
    bvh: Option<BvhNode>,
    light_distribution: Option<Distribution1D>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            lights: Vec::new(),
            env_light: None,
            bvh: None,
            light_distribution: None,
        }
    }

    /// Set the background texture and register it as an environment light,
    /// enabling next event estimation for the background.
    pub fn set_background(&mut self, background: Arc<dyn Texture>) {
        self.env_light = Some(Arc::new(EnvironmentLight::new(background)));
        self.light_distribution = None;
    }

    /// Set an importance-sampled HDRI background.
    pub fn set_background_image(&mut self, image: Arc<ImageTexture>) {
        self.env_light = Some(Arc::new(EnvironmentLight::from_image(image)));
        self.light_distribution = None;
    }

    /// Add an object, promoting it to an area light if its material is
    /// emissive with non-negligible power.
    pub fn add(&mut self, mut object: Box<dyn Hittable>) {
        let emissive = object.material().map_or(false, |m| m.is_emissive());

        if emissive {
            let power = DiffuseAreaLight::estimate_power(object.as_ref());
            if power > EPSILON {
                object.set_light_id(self.lights.len());
                let shared: Arc<dyn Hittable> = Arc::from(object);
                self.lights.push(Arc::new(DiffuseAreaLight::new(shared.clone())));
                self.objects.push(shared);
                self.invalidate();
                return;
            }
        }

        self.objects.push(Arc::from(object));
        self.invalidate();
    }

    /// Manually register a non-geometric light (point light).
    pub fn add_light(&mut self, light: Arc<dyn Light>) {
        if light.power() > EPSILON {
            self.lights.push(light);
            self.light_distribution = None;
        }
    }

    fn invalidate(&mut self) {
        self.bvh = None;
        self.light_distribution = None;
    }

    /// Build the BVH and the power-weighted light selection distribution.
    /// Must run before rendering for acceleration to take effect.
    pub fn build_bvh(&mut self, time0: f32, time1: f32) {
        if !self.objects.is_empty() {
            log::info!("building BVH for {} objects", self.objects.len());
            self.bvh = Some(BvhNode::new(self.objects.clone(), time0, time1));
        }
        self.rebuild_light_distribution();
    }

    fn rebuild_light_distribution(&mut self) {
        let mut powers: Vec<f32> = self.lights.iter().map(|l| l.power()).collect();
        if let Some(env) = &self.env_light {
            if env.power() > EPSILON {
                powers.push(env.power());
            }
        }

        self.light_distribution = if powers.is_empty() {
            None
        } else {
            Some(Distribution1D::new(&powers))
        };
    }

    /// Power-weighted selection over lights (environment last).
    ///
    /// Lazily available only after `build_bvh`; integrators treat None as
    /// "no lights to sample".
    pub fn light_distribution(&self) -> Option<&Distribution1D> {
        self.light_distribution.as_ref()
    }

    /// Index of the environment light in the selection distribution.
    pub fn env_light_index(&self) -> usize {
        self.lights.len()
    }

    /// Closest intersection along the ray. Uses the BVH when built, a
    /// linear sweep otherwise.
    pub fn intersect<'a>(&'a self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord<'a>) -> bool {
        if let Some(bvh) = &self.bvh {
            return bvh.hit(ray, ray_t, rec);
        }

        let mut hit_anything = false;
        let mut closest = ray_t.max;
        for object in &self.objects {
            if object.hit(ray, Interval::new(ray_t.min, closest), rec) {
                hit_anything = true;
                closest = rec.t;
            }
        }
        hit_anything
    }

    /// Fraction of light that survives a shadow ray of length
    /// `max_distance`.
    ///
    /// Transparent occluders attenuate by their transmission color for up
    /// to `max_bounces` crossings; any opaque occluder blocks entirely.
    /// With `treat_transparent_as_opaque` set, transparent surfaces also
    /// block: the photon integrator uses this once transmitted light is
    /// carried by the caustic map instead.
    pub fn transmittance(
        &self,
        ray: &Ray,
        max_distance: f32,
        max_bounces: usize,
        treat_transparent_as_opaque: bool,
    ) -> Vec3 {
        let mut throughput = Vec3::ONE;
        let mut current_ray = *ray;
        let mut remaining = max_distance;

        for _ in 0..max_bounces {
            let mut rec = HitRecord::default();
            if !self.intersect(
                &current_ray,
                Interval::new(SHADOW_EPSILON, remaining),
                &mut rec,
            ) {
                return throughput;
            }

            if treat_transparent_as_opaque || !rec.material.is_transparent() {
                return Vec3::ZERO;
            }

            throughput *= rec.material.evaluate_transmission(&rec);
            if near_zero(throughput) {
                return Vec3::ZERO;
            }

            current_ray = Ray::with_wavelength(
                rec.p,
                current_ray.direction(),
                current_ray.time(),
                current_ray.wavelength(),
            );
            remaining -= rec.t;
        }

        // Exceeded the shadow bounce budget: assume blocked.
        Vec3::ZERO
    }

    /// Background radiance for a ray that missed all geometry.
    pub fn sample_background(&self, ray: &Ray) -> Vec3 {
        match &self.env_light {
            Some(env) => env.eval(ray.direction()),
            None => Vec3::ZERO,
        }
    }

    /// Objects whose material casts caustics; photon emission targets.
    pub fn specular_objects(&self) -> Vec<Arc<dyn Hittable>> {
        self.objects
            .iter()
            .filter(|o| o.material().map_or(false, |m| m.is_specular()))
            .cloned()
            .collect()
    }

    /// Mean luminance of all light powers; used to skip negligible lights.
    pub fn total_light_power(&self) -> f32 {
        self.lights.iter().map(|l| l.power()).sum::<f32>()
            + self.env_light.as_ref().map_or(0.0, |e| e.power())
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prisma_core::SolidColor;
    use crate::material::{Dielectric, DiffuseLight, Lambertian};
    use crate::sphere::Sphere;

    fn lambertian() -> Arc<Lambertian> {
        Arc::new(Lambertian::new(Vec3::splat(0.5)))
    }

    #[test]
    fn test_emissive_objects_are_promoted() {
        let mut scene = Scene::new();
        scene.add(Box::new(Sphere::new(Vec3::ZERO, 1.0, lambertian())));
        scene.add(Box::new(Sphere::new(
            Vec3::new(0.0, 5.0, 0.0),
            1.0,
            Arc::new(DiffuseLight::new(Vec3::splat(4.0))),
        )));

        assert_eq!(scene.objects.len(), 2);
        assert_eq!(scene.lights.len(), 1);

        // The promoted object knows its index in the light list.
        assert_eq!(scene.objects[1].light_id(), Some(0));
        assert_eq!(scene.objects[0].light_id(), None);
    }

    #[test]
    fn test_zero_power_emitters_are_not_promoted() {
        let mut scene = Scene::new();
        scene.add(Box::new(Sphere::new(
            Vec3::ZERO,
            1.0,
            Arc::new(DiffuseLight::new(Vec3::ZERO)),
        )));
        assert!(scene.lights.is_empty());
    }

    #[test]
    fn test_intersect_with_and_without_bvh() {
        let mut scene = Scene::new();
        scene.add(Box::new(Sphere::new(Vec3::new(0.0, 0.0, -3.0), 1.0, lambertian())));
        scene.add(Box::new(Sphere::new(Vec3::new(0.0, 0.0, -6.0), 1.0, lambertian())));

        let ray = Ray::new_simple(Vec3::ZERO, Vec3::NEG_Z);

        // Linear sweep before the BVH exists.
        let mut rec = HitRecord::default();
        assert!(scene.intersect(&ray, Interval::new(0.001, f32::INFINITY), &mut rec));
        assert!((rec.t - 2.0).abs() < 1e-4);

        // Same result after building the BVH.
        scene.build_bvh(0.0, 1.0);
        let mut rec = HitRecord::default();
        assert!(scene.intersect(&ray, Interval::new(0.001, f32::INFINITY), &mut rec));
        assert!((rec.t - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_light_distribution_weights_by_power() {
        let mut scene = Scene::new();
        scene.add(Box::new(Sphere::new(
            Vec3::new(0.0, 5.0, 0.0),
            1.0,
            Arc::new(DiffuseLight::new(Vec3::splat(1.0))),
        )));
        scene.add(Box::new(Sphere::new(
            Vec3::new(5.0, 5.0, 0.0),
            1.0,
            Arc::new(DiffuseLight::new(Vec3::splat(10.0))),
        )));
        scene.build_bvh(0.0, 1.0);

        let dist = scene.light_distribution().unwrap();
        assert_eq!(dist.count(), 2);
        assert!(dist.pdf_discrete(1) > dist.pdf_discrete(0) * 5.0);
    }

    #[test]
    fn test_environment_light_appended_last() {
        let mut scene = Scene::new();
        scene.add(Box::new(Sphere::new(
            Vec3::new(0.0, 5.0, 0.0),
            1.0,
            Arc::new(DiffuseLight::new(Vec3::splat(2.0))),
        )));
        scene.set_background(Arc::new(SolidColor::new(Vec3::splat(0.5))));
        scene.build_bvh(0.0, 1.0);

        let dist = scene.light_distribution().unwrap();
        assert_eq!(dist.count(), 2);
        assert_eq!(scene.env_light_index(), 1);
    }

    #[test]
    fn test_transmittance_opaque_blocks() {
        let mut scene = Scene::new();
        scene.add(Box::new(Sphere::new(Vec3::new(0.0, 0.0, -3.0), 1.0, lambertian())));
        scene.build_bvh(0.0, 1.0);

        let shadow_ray = Ray::new_simple(Vec3::ZERO, Vec3::NEG_Z);
        let t = scene.transmittance(&shadow_ray, 10.0, 5, false);
        assert_eq!(t, Vec3::ZERO);

        // A ray that stops short of the occluder is unobstructed.
        let t = scene.transmittance(&shadow_ray, 1.0, 5, false);
        assert_eq!(t, Vec3::ONE);
    }

    #[test]
    fn test_transmittance_glass_tints() {
        let mut scene = Scene::new();
        let tint = Vec3::new(0.9, 0.2, 0.2);
        scene.add(Box::new(Sphere::new(
            Vec3::new(0.0, 0.0, -3.0),
            1.0,
            Arc::new(Dielectric::new(tint, 1.5)),
        )));
        scene.build_bvh(0.0, 1.0);

        let shadow_ray = Ray::new_simple(Vec3::ZERO, Vec3::NEG_Z);
        let t = scene.transmittance(&shadow_ray, 10.0, 5, false);

        // Two surface crossings, each attenuated by the tint.
        let expected = tint * tint;
        assert!((t - expected).length() < 1e-4);

        // Treating transparent surfaces as opaque blocks the ray.
        let t = scene.transmittance(&shadow_ray, 10.0, 5, true);
        assert_eq!(t, Vec3::ZERO);
    }

    #[test]
    fn test_transmittance_bounce_budget() {
        let mut scene = Scene::new();
        let glass = Arc::new(Dielectric::new(Vec3::ONE, 1.5));
        // Ten glass spheres in a row: 20 crossings exceeds the budget.
        for i in 0..10 {
            scene.add(Box::new(Sphere::new(
                Vec3::new(0.0, 0.0, -3.0 * (i as f32 + 1.0)),
                1.0,
                glass.clone(),
            )));
        }
        scene.build_bvh(0.0, 1.0);

        let shadow_ray = Ray::new_simple(Vec3::ZERO, Vec3::NEG_Z);
        let t = scene.transmittance(&shadow_ray, 100.0, 5, false);
        assert_eq!(t, Vec3::ZERO);
    }

    #[test]
    fn test_specular_scan() {
        let mut scene = Scene::new();
        scene.add(Box::new(Sphere::new(Vec3::ZERO, 1.0, lambertian())));
        scene.add(Box::new(Sphere::new(
            Vec3::new(3.0, 0.0, 0.0),
            1.0,
            Arc::new(Dielectric::new(Vec3::ONE, 1.5)),
        )));

        assert_eq!(scene.specular_objects().len(), 1);
    }

    #[test]
    fn test_background_sampling() {
        let mut scene = Scene::new();
        let ray = Ray::new_simple(Vec3::ZERO, Vec3::Y);
        assert_eq!(scene.sample_background(&ray), Vec3::ZERO);

        scene.set_background(Arc::new(SolidColor::new(Vec3::new(0.2, 0.4, 0.8))));
        assert!((scene.sample_background(&ray) - Vec3::new(0.2, 0.4, 0.8)).length() < 1e-5);
    }
}
