//! Radiance estimation: the integrator protocol, shared MIS helpers and
//! the unidirectional path tracer.

use prisma_math::sampling::random_f32;
use prisma_math::{near_zero, Interval, Ray, Vec3, EPSILON, SHADOW_EPSILON};

use crate::hittable::HitRecord;
use crate::light::Light;
use crate::material::{clamp_radiance, max_channel, ScatterRecord};
use crate::scene::Scene;

/// Number of transparent surfaces a shadow ray may cross.
pub(crate) const SHADOW_MAX_BOUNCES: usize = 5;

/// A rendering algorithm: estimates radiance along a camera ray.
pub trait Integrator: Send + Sync {
    fn li(&self, ray: &Ray, scene: &Scene) -> Vec3;

    /// Short tag used in snapshot filenames ("PT", "PM").
    fn tag(&self) -> &'static str;
}

/// Power heuristic, the MIS weight: f^2 / (f^2 + g^2).
pub(crate) fn power_heuristic(pdf_f: f32, pdf_g: f32) -> f32 {
    let f2 = pdf_f * pdf_f;
    let g2 = pdf_g * pdf_g;
    let denom = f2 + g2;
    if denom > 0.0 {
        f2 / denom
    } else {
        0.0
    }
}

/// Next event estimation: sample one light by emitted power, test
/// visibility through transparent occluders, and MIS-weight the result
/// against BSDF sampling.
///
/// `block_transparent` makes the shadow ray treat transparent occluders as
/// opaque; the photon integrator sets it once transmitted light is carried
/// by the caustic map. The environment light always blocks transparent
/// occluders because its transmitted contribution already arrives through
/// specular BSDF chains at full MIS weight.
pub(crate) fn sample_one_light(
    scene: &Scene,
    rec: &HitRecord,
    srec: &ScatterRecord,
    current_ray: &Ray,
    block_transparent: bool,
) -> Vec3 {
    let distribution = match scene.light_distribution() {
        Some(d) if d.count() > 0 => d,
        _ => return Vec3::ZERO,
    };

    // 1. Pick a light with probability proportional to its power.
    let (light_idx, select_pdf, _) = distribution.sample_discrete(random_f32());
    if select_pdf <= 0.0 {
        return Vec3::ZERO;
    }

    let n_scene_lights = scene.lights.len();
    let (light, block_transparent): (&dyn Light, bool) = if light_idx < n_scene_lights {
        (scene.lights[light_idx].as_ref(), block_transparent)
    } else {
        // The environment entry sits past the scene lights.
        match &scene.env_light {
            Some(env) => (env.as_ref() as &dyn Light, true),
            None => return Vec3::ZERO,
        }
    };

    // 2. Sample a direction towards it.
    let sample = light.sample_li(rec.p);
    if sample.pdf <= EPSILON || near_zero(sample.radiance) {
        return Vec3::ZERO;
    }

    let shadow_ray = Ray::new(rec.p, sample.direction, current_ray.time());

    // 3. Material response for the light direction.
    let f_r = rec.material.eval(current_ray, rec, &shadow_ray, srec.shading_normal);
    if near_zero(f_r) {
        return Vec3::ZERO;
    }

    let cos_theta = srec.shading_normal.dot(sample.direction);
    if cos_theta <= 0.0 {
        return Vec3::ZERO;
    }

    // 4. Visibility through transparent occluders.
    let visibility = scene.transmittance(
        &shadow_ray,
        sample.distance - SHADOW_EPSILON,
        SHADOW_MAX_BOUNCES,
        block_transparent,
    );
    if near_zero(visibility) {
        return Vec3::ZERO;
    }

    // 5. MIS against the density BSDF sampling would have assigned.
    let bsdf_pdf = rec
        .material
        .scattering_pdf(current_ray, rec, &shadow_ray, srec.shading_normal);

    let total_light_pdf = select_pdf * sample.pdf;
    let weight = power_heuristic(total_light_pdf, bsdf_pdf);

    sample.radiance * f_r * cos_theta * weight * visibility / total_light_pdf
}

/// Environment lookup for a ray that missed all geometry, MIS-weighted
/// against the probability NEE would have sampled the same direction.
pub(crate) fn eval_environment(scene: &Scene, ray: &Ray, bsdf_pdf: f32, specular: bool) -> Vec3 {
    let env_color = scene.sample_background(ray);

    let distribution = match scene.light_distribution() {
        Some(d) => d,
        None => return env_color,
    };
    let env = match &scene.env_light {
        Some(env) => env,
        None => return env_color,
    };
    if specular {
        return env_color;
    }

    let select_pdf = distribution.pdf_discrete(scene.env_light_index());
    let dir_pdf = env.pdf_value(Vec3::ZERO, ray.direction());
    let total_light_pdf = select_pdf * dir_pdf;

    env_color * power_heuristic(bsdf_pdf, total_light_pdf)
}

/// Emission for a BSDF ray that hit a light, MIS-weighted against the
/// probability NEE would have selected the same light and direction.
pub(crate) fn eval_emission(
    scene: &Scene,
    rec: &HitRecord,
    ray: &Ray,
    bsdf_pdf: f32,
    specular: bool,
) -> Vec3 {
    let emitted = rec.material.emitted(rec.u, rec.v, rec.p);

    let distribution = match scene.light_distribution() {
        Some(d) => d,
        None => return emitted,
    };
    if specular {
        return emitted;
    }

    // Identify the hit light; an unregistered emitter keeps full weight.
    let light_idx = match rec.light_id() {
        Some(idx) => idx,
        None => return emitted,
    };

    let select_pdf = distribution.pdf_discrete(light_idx);
    let solid_angle_pdf = match rec.object {
        Some(object) => object.pdf_value(ray.origin(), ray.direction()),
        None => return emitted,
    };

    let total_light_pdf = select_pdf * solid_angle_pdf;
    emitted * power_heuristic(bsdf_pdf, total_light_pdf)
}

/// Unidirectional path tracer with next event estimation, multiple
/// importance sampling and Russian roulette.
pub struct PathIntegrator {
    max_depth: usize,
    firefly_clamp: f32,
}

impl PathIntegrator {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            firefly_clamp: 5.0,
        }
    }

    pub fn with_firefly_clamp(mut self, limit: f32) -> Self {
        self.firefly_clamp = limit;
        self
    }
}

impl Integrator for PathIntegrator {
    fn li(&self, start_ray: &Ray, scene: &Scene) -> Vec3 {
        let mut current_ray = *start_ray;
        let mut l = Vec3::ZERO;
        let mut throughput = Vec3::ONE;

        let mut last_bsdf_pdf = 0.0;
        // The primary ray counts as specular so directly visible emitters
        // keep their full brightness.
        let mut last_bounce_specular = true;

        for bounce in 0..self.max_depth {
            let mut rec = HitRecord::default();

            // 1. Intersection
            if !scene.intersect(
                &current_ray,
                Interval::new(SHADOW_EPSILON, f32::INFINITY),
                &mut rec,
            ) {
                l += throughput
                    * eval_environment(scene, &current_ray, last_bsdf_pdf, last_bounce_specular);
                break;
            }

            // 2. Emission: the BSDF ray reached a light
            if rec.material.is_emissive() {
                let mut e = throughput
                    * eval_emission(scene, &rec, &current_ray, last_bsdf_pdf, last_bounce_specular);
                if bounce > 0 {
                    e = clamp_radiance(e, self.firefly_clamp);
                }
                l += e;
                break;
            }

            // 3. Material sampling
            let srec = match rec.material.scatter(&current_ray, &rec) {
                Some(srec) => srec,
                None => break,
            };

            // 4. Direct lighting via NEE at non-specular vertices
            if !srec.specular {
                let e = throughput * sample_one_light(scene, &rec, &srec, &current_ray, false);
                l += clamp_radiance(e, self.firefly_clamp);
            }

            // 5. Throughput update for the sampled bounce
            if srec.specular {
                throughput *= srec.attenuation;
                last_bsdf_pdf = 1.0; // placeholder for the Dirac density
            } else {
                if srec.pdf <= EPSILON {
                    break;
                }
                let cos_theta = srec.shading_normal.dot(srec.ray.direction()).abs();
                let f_r = rec
                    .material
                    .eval(&current_ray, &rec, &srec.ray, srec.shading_normal);
                throughput *= f_r * cos_theta / srec.pdf;
                last_bsdf_pdf = srec.pdf;
            }

            current_ray = srec.ray;
            last_bounce_specular = srec.specular;

            // 6. Russian roulette
            if bounce > 3 {
                let p = max_channel(throughput).min(1.0);
                if random_f32() > p {
                    break;
                }
                throughput /= p;
            }
        }

        // Never hand a non-finite sample to the accumulator.
        if !l.is_finite() {
            return Vec3::ZERO;
        }
        l
    }

    fn tag(&self) -> &'static str {
        "PT"
    }
}
