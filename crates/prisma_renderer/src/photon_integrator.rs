//! Two-pass photon mapping: caustic and global photon maps combined with
//! path tracing through a sticky caustic-path rule.
//!
//! Pass 1 emits photons from the lights, splitting the budget between a
//! targeted caustic pass (aimed at specular objects) and a global pass.
//! Landing photons are classified by their path history: last bounce
//! specular goes to the caustic map, anything that landed after at least
//! one diffuse bounce goes to the global map, and direct landings are
//! excluded. Pass 2 walks camera paths; at the first diffuse vertex it
//! combines next event estimation, a caustic map lookup and either final
//! gather or a global map lookup. A diffuse-to-specular transition sets a
//! sticky flag that disables NEE, map queries and emission on later diffuse
//! vertices of the same branch so no transport path is counted twice.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rayon::prelude::*;

use prisma_math::sampling::random_f32;
use prisma_math::{Interval, Ray, Vec3, EPSILON, SHADOW_EPSILON};

use crate::hittable::HitRecord;
use crate::integrator::{
    eval_emission, eval_environment, sample_one_light, Integrator,
};
use crate::material::{clamp_radiance, max_channel, Color};
use crate::photon_map::{Photon, PhotonMap};
use crate::scene::Scene;

/// Parameters of the photon mapping preprocess and gather.
#[derive(Debug, Clone)]
pub struct PhotonMappingConfig {
    pub max_depth: usize,
    /// Total photons to emit, split between caustic and global budgets.
    pub photon_count: usize,
    /// Initial gather radius for the caustic map
    pub caustic_radius: f32,
    /// Initial gather radius for the global map
    pub global_radius: f32,
    /// Neighbors gathered per density estimate
    pub k_nearest: usize,
    /// Path depth after which the global map replaces further gathering
    pub final_gather_bound: usize,
    pub firefly_clamp: f32,
}

impl Default for PhotonMappingConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            photon_count: 200_000,
            caustic_radius: 1.0,
            global_radius: 4.0,
            k_nearest: 200,
            final_gather_bound: 5,
            firefly_clamp: 5.0,
        }
    }
}

/// Which emission pass a photon belongs to. The passes partition photon
/// path space: targeted photons cover light-to-specular-chain suffixes and
/// die on any other route, global photons cover everything that bounced
/// diffusely first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhotonPass {
    Caustic,
    Global,
}

pub struct PhotonIntegrator {
    config: PhotonMappingConfig,
    caustic_map: PhotonMap,
    global_map: PhotonMap,
    /// Shadow rays treat glass as opaque once the caustic map carries the
    /// transmitted light.
    nee_blocks_transparent: bool,
}

impl PhotonIntegrator {
    /// Emit photons and build both KD-trees for the given scene.
    pub fn new(config: PhotonMappingConfig, scene: &Scene) -> Self {
        let mut integrator = Self {
            config,
            caustic_map: PhotonMap::new(),
            global_map: PhotonMap::new(),
            nee_blocks_transparent: false,
        };
        integrator.build_photon_maps(scene);
        integrator
    }

    pub fn caustic_photons(&self) -> usize {
        self.caustic_map.len()
    }

    pub fn global_photons(&self) -> usize {
        self.global_map.len()
    }

    fn build_photon_maps(&mut self, scene: &Scene) {
        if scene.lights.is_empty() {
            log::warn!("no lights in scene; photon maps will be empty");
            return;
        }

        let total_power: f32 = scene.lights.iter().map(|l| l.power()).sum();
        if total_power <= EPSILON {
            log::warn!("total light power is zero; skipping photon emission");
            return;
        }

        let targets = scene.specular_objects();

        // Half the budget goes to targeted caustic photons when there is
        // anything to aim at.
        let caustic_budget = if targets.is_empty() {
            0
        } else {
            self.config.photon_count / 2
        };
        let global_budget = self.config.photon_count - caustic_budget;

        log::info!(
            "emitting {} photons ({} caustic, {} global) from {} lights",
            self.config.photon_count,
            caustic_budget,
            global_budget,
            scene.lights.len()
        );

        let caustic_store: Mutex<Vec<Photon>> = Mutex::new(Vec::new());
        let global_store: Mutex<Vec<Photon>> = Mutex::new(Vec::new());
        let progress = AtomicUsize::new(0);
        let progress_print = Mutex::new(());

        for light in &scene.lights {
            let share = light.power() / total_power;

            // ----- Global pass -----
            let n_global = (global_budget as f32 * share).round() as usize;
            if n_global > 0 {
                self.emit_batch(
                    scene,
                    n_global,
                    || light.emit(n_global as f32),
                    PhotonPass::Global,
                    &caustic_store,
                    &global_store,
                    &progress,
                    &progress_print,
                );
            }

            // ----- Caustic pass, split across specular targets -----
            if !targets.is_empty() {
                let n_caustic = (caustic_budget as f32 * share).round() as usize;
                let per_target = n_caustic / targets.len();
                if per_target == 0 {
                    continue;
                }
                for target in &targets {
                    self.emit_batch(
                        scene,
                        per_target,
                        || light.emit_targeted(per_target as f32, target.as_ref()),
                        PhotonPass::Caustic,
                        &caustic_store,
                        &global_store,
                        &progress,
                        &progress_print,
                    );
                }
            }
        }

        let caustic = caustic_store.into_inner().unwrap_or_default();
        let global = global_store.into_inner().unwrap_or_default();

        self.caustic_map.extend(caustic);
        self.global_map.extend(global);
        self.caustic_map.build();
        self.global_map.build();

        self.nee_blocks_transparent = !self.caustic_map.is_empty();

        log::info!(
            "photon maps ready: {} caustic, {} global",
            self.caustic_map.len(),
            self.global_map.len()
        );
    }

    /// Emit and trace a batch of photons in parallel. Workers accumulate
    /// into thread-local lists and merge under the store mutexes once per
    /// chunk; progress printing is guarded by a try-lock so workers never
    /// block on logging.
    #[allow(clippy::too_many_arguments)]
    fn emit_batch<F>(
        &self,
        scene: &Scene,
        count: usize,
        emit: F,
        pass: PhotonPass,
        caustic_store: &Mutex<Vec<Photon>>,
        global_store: &Mutex<Vec<Photon>>,
        progress: &AtomicUsize,
        progress_print: &Mutex<()>,
    ) where
        F: Fn() -> Option<crate::light::PhotonEmission> + Sync,
    {
        const CHUNK: usize = 4096;
        let n_chunks = count.div_ceil(CHUNK);

        (0..n_chunks).into_par_iter().for_each(|chunk_idx| {
            let chunk_count = CHUNK.min(count - chunk_idx * CHUNK);
            let mut local_caustic = Vec::new();
            let mut local_global = Vec::new();

            for _ in 0..chunk_count {
                if let Some(emission) = emit() {
                    if emission.power.max_element() <= 0.0 {
                        continue;
                    }
                    let ray = Ray::new(
                        emission.origin + emission.direction * SHADOW_EPSILON,
                        emission.direction,
                        0.0,
                    );
                    self.trace_photon(
                        scene,
                        ray,
                        emission.power,
                        pass,
                        &mut local_caustic,
                        &mut local_global,
                    );
                }
            }

            let done = progress.fetch_add(chunk_count, Ordering::Relaxed) + chunk_count;
            if let Ok(_guard) = progress_print.try_lock() {
                log::debug!("photon emission progress: {done}");
            }

            if !local_caustic.is_empty() {
                caustic_store
                    .lock()
                    .expect("photon store poisoned")
                    .append(&mut local_caustic);
            }
            if !local_global.is_empty() {
                global_store
                    .lock()
                    .expect("photon store poisoned")
                    .append(&mut local_global);
            }
        });
    }

    /// Trace one photon through the scene, storing it at diffuse landings
    /// according to its pass and path history.
    fn trace_photon(
        &self,
        scene: &Scene,
        mut ray: Ray,
        mut power: Vec3,
        pass: PhotonPass,
        out_caustic: &mut Vec<Photon>,
        out_global: &mut Vec<Photon>,
    ) {
        let mut depth = 0;
        let mut prev_bounce_specular = false;
        let mut bounced_diffusely = false;

        while depth < self.config.max_depth {
            let mut rec = HitRecord::default();
            if !scene.intersect(&ray, Interval::new(SHADOW_EPSILON, f32::INFINITY), &mut rec) {
                break;
            }

            let srec = match rec.material.scatter(&ray, &rec) {
                Some(srec) => srec,
                None => break, // absorbed (hit a light or black body)
            };

            if srec.specular {
                // Specular chains straight from the light belong to the
                // targeted pass; the global pass drops them to keep the two
                // photon populations disjoint.
                if pass == PhotonPass::Global && !bounced_diffusely {
                    break;
                }
                power *= srec.attenuation;
                ray = srec.ray;
                prev_bounce_specular = true;
                depth += 1;
                continue;
            }

            // Diffuse landing
            let photon = Photon {
                position: rec.p,
                power,
                incoming: -ray.direction(),
                plane: 0,
            };

            match pass {
                PhotonPass::Caustic => {
                    if prev_bounce_specular {
                        out_caustic.push(photon);
                    }
                    // Targeted photons only carry specular chains.
                    break;
                }
                PhotonPass::Global => {
                    if depth > 0 {
                        if prev_bounce_specular {
                            out_caustic.push(photon);
                        } else {
                            out_global.push(photon);
                        }
                    }
                }
            }

            // Russian roulette on the surface reflectance.
            let q = max_channel(srec.attenuation).clamp(0.05, 0.95);
            if random_f32() > q {
                break;
            }
            power *= srec.attenuation / q;

            ray = srec.ray;
            prev_bounce_specular = false;
            bounced_diffusely = true;
            depth += 1;
        }
    }

    /// Density estimate at a diffuse hit: k-nearest photons with a cone
    /// filter and Jensen's normalization.
    fn estimate_from_map(
        &self,
        map: &PhotonMap,
        rec: &HitRecord,
        albedo: Color,
        radius: f32,
    ) -> Vec3 {
        if map.is_empty() {
            return Vec3::ZERO;
        }

        let k = self.config.k_nearest;
        let (neighbors, r2) = map.find_knn(rec.p, k, radius);
        if neighbors.is_empty() || r2 <= EPSILON {
            return Vec3::ZERO;
        }

        let r = r2.sqrt();
        let mut flux = Vec3::ZERO;
        for near in &neighbors {
            let photon = map.photon(near.index);
            // Reject photons arriving from behind the surface (leakage
            // through thin geometry).
            if rec.normal.dot(photon.incoming) > 0.0 {
                flux += photon.power * (1.0 - near.dist_sq.sqrt() / r);
            }
        }

        // Cone filter normalization: (1 - 2/(3k)) pi r^2, then the
        // Lambertian BRDF albedo / pi.
        let normalization = (1.0 - 2.0 / (3.0 * k as f32)) * PI * r2;
        flux / normalization * albedo / PI
    }
}

impl Integrator for PhotonIntegrator {
    fn li(&self, start_ray: &Ray, scene: &Scene) -> Vec3 {
        let mut current_ray = *start_ray;
        let mut l = Vec3::ZERO;
        let mut throughput = Vec3::ONE;

        let mut last_bsdf_pdf = 0.0;
        let mut last_bounce_specular = true;
        let mut prev_bounce_diffuse = false;
        // Once a diffuse vertex hands off to a specular chain, everything
        // it reflects was already estimated at that vertex: the branch
        // keeps walking only to pick up the environment.
        let mut in_caustic_path = false;

        for bounce in 0..self.config.max_depth {
            let mut rec = HitRecord::default();

            if !scene.intersect(
                &current_ray,
                Interval::new(SHADOW_EPSILON, f32::INFINITY),
                &mut rec,
            ) {
                // The environment is not in the photon maps; always MIS.
                let mut e = throughput
                    * eval_environment(scene, &current_ray, last_bsdf_pdf, last_bounce_specular);
                if bounce > 0 {
                    e = clamp_radiance(e, self.config.firefly_clamp);
                }
                l += e;
                break;
            }

            if rec.material.is_emissive() {
                if !in_caustic_path {
                    let mut e = throughput
                        * eval_emission(
                            scene,
                            &rec,
                            &current_ray,
                            last_bsdf_pdf,
                            last_bounce_specular,
                        );
                    if bounce > 0 {
                        e = clamp_radiance(e, self.config.firefly_clamp);
                    }
                    l += e;
                }
                break;
            }

            let srec = match rec.material.scatter(&current_ray, &rec) {
                Some(srec) => srec,
                None => break,
            };

            if srec.specular {
                if prev_bounce_diffuse {
                    in_caustic_path = true;
                }
                throughput *= srec.attenuation;
                current_ray = srec.ray;
                last_bounce_specular = true;
                last_bsdf_pdf = 1.0;
                prev_bounce_diffuse = false;
            } else if in_caustic_path {
                // Past the caustic origin: no NEE, no maps, no emission;
                // only the environment termination remains.
                if srec.pdf <= EPSILON {
                    break;
                }
                let cos_theta = srec.shading_normal.dot(srec.ray.direction()).abs();
                let f_r = rec
                    .material
                    .eval(&current_ray, &rec, &srec.ray, srec.shading_normal);
                throughput *= f_r * cos_theta / srec.pdf;
                current_ray = srec.ray;
                last_bounce_specular = false;
                last_bsdf_pdf = srec.pdf;
                prev_bounce_diffuse = true;
            } else {
                // A. Direct light via NEE
                let e = throughput
                    * sample_one_light(
                        scene,
                        &rec,
                        &srec,
                        &current_ray,
                        self.nee_blocks_transparent,
                    );
                l += clamp_radiance(e, self.config.firefly_clamp);

                // B. Caustic radiance from the caustic map
                let mut e = throughput
                    * self.estimate_from_map(
                        &self.caustic_map,
                        &rec,
                        srec.attenuation,
                        self.config.caustic_radius,
                    );
                if bounce > 0 {
                    e = clamp_radiance(e, self.config.firefly_clamp);
                }
                l += e;

                // C. Indirect: final gather while shallow, global map once
                // deep enough.
                if bounce < self.config.final_gather_bound {
                    if srec.pdf <= EPSILON {
                        break;
                    }
                    let cos_theta = srec.shading_normal.dot(srec.ray.direction()).abs();
                    let f_r = rec
                        .material
                        .eval(&current_ray, &rec, &srec.ray, srec.shading_normal);
                    throughput *= f_r * cos_theta / srec.pdf;
                    current_ray = srec.ray;
                    last_bounce_specular = false;
                    last_bsdf_pdf = srec.pdf;
                    prev_bounce_diffuse = true;
                } else {
                    let e = throughput
                        * self.estimate_from_map(
                            &self.global_map,
                            &rec,
                            srec.attenuation,
                            self.config.global_radius,
                        );
                    l += clamp_radiance(e, self.config.firefly_clamp);
                    break;
                }
            }

            if bounce > 3 {
                let p = max_channel(throughput).min(1.0);
                if random_f32() > p {
                    break;
                }
                throughput /= p;
            }
        }

        if !l.is_finite() {
            return Vec3::ZERO;
        }
        l
    }

    fn tag(&self) -> &'static str {
        "PM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::integrator::PathIntegrator;
    use crate::material::{Dielectric, DiffuseLight, Lambertian};
    use crate::sphere::Sphere;
    use crate::triangle::Triangle;

    /// A closed-ish box: diffuse floor, emissive ceiling panel.
    fn diffuse_scene() -> Scene {
        let mut scene = Scene::new();
        let white = Arc::new(Lambertian::new(Vec3::splat(0.73)));

        // Floor quad
        scene.add(Box::new(Triangle::new(
            Vec3::new(-5.0, 0.0, -5.0),
            Vec3::new(5.0, 0.0, -5.0),
            Vec3::new(5.0, 0.0, 5.0),
            white.clone(),
        )));
        scene.add(Box::new(Triangle::new(
            Vec3::new(-5.0, 0.0, -5.0),
            Vec3::new(5.0, 0.0, 5.0),
            Vec3::new(-5.0, 0.0, 5.0),
            white.clone(),
        )));

        // Side walls so indirect bounces have somewhere to land
        for x in [-5.0f32, 5.0] {
            scene.add(Box::new(Triangle::new(
                Vec3::new(x, 0.0, -5.0),
                Vec3::new(x, 8.0, -5.0),
                Vec3::new(x, 8.0, 5.0),
                white.clone(),
            )));
            scene.add(Box::new(Triangle::new(
                Vec3::new(x, 0.0, -5.0),
                Vec3::new(x, 8.0, 5.0),
                Vec3::new(x, 0.0, 5.0),
                white.clone(),
            )));
        }

        // Light panel above
        let light = Arc::new(DiffuseLight::new(Vec3::splat(10.0)));
        scene.add(Box::new(Triangle::new(
            Vec3::new(-1.0, 6.0, -1.0),
            Vec3::new(1.0, 6.0, -1.0),
            Vec3::new(1.0, 6.0, 1.0),
            light.clone(),
        )));
        scene.add(Box::new(Triangle::new(
            Vec3::new(-1.0, 6.0, -1.0),
            Vec3::new(1.0, 6.0, 1.0),
            Vec3::new(-1.0, 6.0, 1.0),
            light,
        )));

        scene.build_bvh(0.0, 1.0);
        scene
    }

    fn caustic_scene() -> Scene {
        let mut scene = diffuse_scene();
        scene.add(Box::new(Sphere::new(
            Vec3::new(0.0, 1.5, 0.0),
            1.0,
            Arc::new(Dielectric::new(Vec3::ONE, 1.5)),
        )));
        scene.build_bvh(0.0, 1.0);
        scene
    }

    fn small_config(photons: usize) -> PhotonMappingConfig {
        PhotonMappingConfig {
            max_depth: 16,
            photon_count: photons,
            caustic_radius: 1.0,
            global_radius: 3.0,
            k_nearest: 40,
            final_gather_bound: 2,
            firefly_clamp: 50.0,
        }
    }

    #[test]
    fn test_photon_maps_populate() {
        let scene = diffuse_scene();
        let integrator = PhotonIntegrator::new(small_config(20_000), &scene);

        // No specular objects: everything lands in the global map.
        assert_eq!(integrator.caustic_photons(), 0);
        assert!(integrator.global_photons() > 100);
        assert!(!integrator.nee_blocks_transparent);
    }

    #[test]
    fn test_caustic_map_populates_with_glass() {
        let scene = caustic_scene();
        let integrator = PhotonIntegrator::new(small_config(40_000), &scene);

        assert!(integrator.caustic_photons() > 50, "no caustic photons stored");
        assert!(integrator.nee_blocks_transparent);
    }

    #[test]
    fn test_no_lights_falls_back_gracefully() {
        let mut scene = Scene::new();
        scene.add(Box::new(Sphere::new(
            Vec3::ZERO,
            1.0,
            Arc::new(Lambertian::new(Vec3::splat(0.5))),
        )));
        scene.build_bvh(0.0, 1.0);

        let integrator = PhotonIntegrator::new(small_config(1000), &scene);
        assert_eq!(integrator.caustic_photons(), 0);
        assert_eq!(integrator.global_photons(), 0);

        let ray = Ray::new_simple(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let l = integrator.li(&ray, &scene);
        assert!(l.is_finite());
    }

    #[test]
    fn test_radiance_finite_and_nonnegative() {
        let scene = caustic_scene();
        let integrator = PhotonIntegrator::new(small_config(30_000), &scene);

        for i in 0..200 {
            let s = (i as f32 / 200.0) * 2.0 - 1.0;
            let ray = Ray::new_simple(
                Vec3::new(4.0 * s, 3.0, 8.0),
                Vec3::new(-0.3 * s, -0.4, -1.0),
            );
            let l = integrator.li(&ray, &scene);
            assert!(l.is_finite());
            assert!(l.min_element() >= 0.0);
        }
    }

    #[test]
    fn test_agreement_with_path_tracer() {
        // MIS unbiasedness: both integrators converge to the same mean on
        // a diffuse-only scene.
        let scene = diffuse_scene();
        let pm = PhotonIntegrator::new(small_config(80_000), &scene);
        let pt = PathIntegrator::new(16).with_firefly_clamp(50.0);

        let ray = Ray::new_simple(Vec3::new(0.0, 3.0, 6.0), Vec3::new(0.0, -0.45, -1.0));

        let n = 4000;
        let mut pt_mean = Vec3::ZERO;
        let mut pm_mean = Vec3::ZERO;
        for _ in 0..n {
            pt_mean += pt.li(&ray, &scene);
            pm_mean += pm.li(&ray, &scene);
        }
        pt_mean /= n as f32;
        pm_mean /= n as f32;

        let diff = (pt_mean - pm_mean).length();
        let scale = pt_mean.length().max(0.01);
        assert!(
            diff / scale < 0.25,
            "integrators disagree: PT {pt_mean:?} vs PM {pm_mean:?}"
        );
    }
}
