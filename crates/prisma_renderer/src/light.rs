//! Light sampling and photon emission.
//!
//! Lights are sampled explicitly by the integrators (next event
//! estimation); geometric lights wrap a scene object and delegate the
//! directional sampling to it. Every light reports an emitted-flux estimate
//! used for power-weighted light selection.

use std::f32::consts::PI;
use std::sync::Arc;

use prisma_core::{Distribution2D, ImageTexture, Texture};
use prisma_math::sampling::{random_cosine_direction, random_f32, random_unit_vector};
use prisma_math::{get_sphere_uv, luminance, uv_to_sphere, Onb, Vec3, EPSILON};

use crate::hittable::Hittable;

/// Result of sampling a light from a shading point.
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    /// Radiance arriving from the light
    pub radiance: Vec3,
    /// Unit direction from the shading point towards the light
    pub direction: Vec3,
    /// Solid-angle density of the sampled direction
    pub pdf: f32,
    /// Distance to the sampled light point (for the shadow ray)
    pub distance: f32,
}

impl LightSample {
    /// A zero sample: contributes nothing, never divided by.
    pub fn zero() -> Self {
        Self {
            radiance: Vec3::ZERO,
            direction: Vec3::X,
            pdf: 0.0,
            distance: 0.0,
        }
    }
}

/// A photon leaving a light.
#[derive(Debug, Clone, Copy)]
pub struct PhotonEmission {
    pub origin: Vec3,
    pub direction: Vec3,
    pub power: Vec3,
}

/// Protocol shared by all light kinds.
pub trait Light: Send + Sync {
    /// Sample a direction towards the light from `origin`.
    fn sample_li(&self, origin: Vec3) -> LightSample;

    /// Density of sampling direction `wi` from `origin` towards this light.
    /// Zero for lights that BSDF sampling can never hit (point lights).
    fn pdf_value(&self, origin: Vec3, wi: Vec3) -> f32;

    /// Emit a photon. `total_photons` is the planned emission count for
    /// this light, used to normalize per-photon power.
    fn emit(&self, total_photons: f32) -> Option<PhotonEmission>;

    /// Emit a photon aimed at a target object, re-weighted so the energy
    /// estimate stays unbiased. Defaults to undirected emission.
    fn emit_targeted(&self, total_photons: f32, _target: &dyn Hittable) -> Option<PhotonEmission> {
        self.emit(total_photons)
    }

    /// Estimated total emitted flux, used for power-weighted selection.
    fn power(&self) -> f32;
}

// =============================================================================
// DiffuseAreaLight
// =============================================================================

/// Wraps a geometric object carrying an emissive material.
///
/// Bridges geometry and lighting: directional sampling and densities are
/// delegated to the shape, emission is evaluated at the sampled surface
/// point so textured emitters work.
pub struct DiffuseAreaLight {
    shape: Arc<dyn Hittable>,
    est_power: f32,
}

impl DiffuseAreaLight {
    pub fn new(shape: Arc<dyn Hittable>) -> Self {
        let est_power = Self::estimate_power(shape.as_ref());
        Self { shape, est_power }
    }

    /// Flux estimate: grayscale(mean emission) * area * pi, averaged over a
    /// few surface samples so textured emitters are represented fairly.
    pub fn estimate_power(shape: &dyn Hittable) -> f32 {
        let material = match shape.material() {
            Some(m) => m,
            None => return 0.0,
        };

        let samples = 8;
        let mut accum = Vec3::ZERO;
        let mut area = 0.0;
        for _ in 0..samples {
            match shape.sample_surface() {
                Some(s) => {
                    accum += material.emitted(0.0, 0.0, s.position);
                    area = s.area;
                }
                None => return 0.0,
            }
        }

        luminance(accum / samples as f32) * area * PI
    }
}

impl Light for DiffuseAreaLight {
    fn sample_li(&self, origin: Vec3) -> LightSample {
        let to_light = self.shape.random_pointing_vector(origin);
        let distance = to_light.length();
        if distance < EPSILON {
            return LightSample::zero();
        }

        let direction = to_light / distance;
        let pdf = self.shape.pdf_value(origin, direction);
        if pdf <= EPSILON {
            return LightSample::zero();
        }

        let material = match self.shape.material() {
            Some(m) => m,
            None => return LightSample::zero(),
        };

        // Evaluate emission at the actual surface point so spatially
        // varying emission textures work.
        let radiance = material.emitted(0.0, 0.0, origin + direction * distance);

        LightSample {
            radiance,
            direction,
            pdf,
            distance,
        }
    }

    fn pdf_value(&self, origin: Vec3, wi: Vec3) -> f32 {
        self.shape.pdf_value(origin, wi)
    }

    /// Cosine-weighted emission from a uniform surface point.
    ///
    /// Flux of a Lambertian emitter is Le * area * pi; the cosine in the
    /// flux integral cancels against the cosine-weighted direction pdf.
    fn emit(&self, total_photons: f32) -> Option<PhotonEmission> {
        let surface = self.shape.sample_surface()?;
        let material = self.shape.material()?;

        let uvw = Onb::from_normal(surface.normal);
        let direction = uvw.local(random_cosine_direction());

        let le = material.emitted(0.0, 0.0, surface.position);
        if surface.area <= EPSILON || total_photons <= 0.0 {
            return None;
        }

        Some(PhotonEmission {
            origin: surface.position,
            direction,
            power: le * PI * surface.area / total_photons,
        })
    }

    /// Aim a photon at a target object, re-weighted by the light-surface
    /// cosine over the target's solid-angle density.
    fn emit_targeted(&self, total_photons: f32, target: &dyn Hittable) -> Option<PhotonEmission> {
        let surface = self.shape.sample_surface()?;
        let material = self.shape.material()?;
        if surface.area <= EPSILON {
            return None;
        }

        let to_target = target.random_pointing_vector(surface.position);
        let dist = to_target.length();
        if dist <= EPSILON {
            return None;
        }
        let direction = to_target / dist;

        let cos_theta = surface.normal.dot(direction);
        if cos_theta <= 0.0 {
            return None;
        }

        let pdf_dir = target.pdf_value(surface.position, direction);
        if pdf_dir <= EPSILON {
            return None;
        }

        let le = material.emitted(0.0, 0.0, surface.position);
        // total pdf = pdf_dir / area; power = Le cos / (N * total_pdf)
        let power = le * cos_theta * surface.area / (total_photons * pdf_dir);

        Some(PhotonEmission {
            origin: surface.position,
            direction,
            power,
        })
    }

    fn power(&self) -> f32 {
        self.est_power
    }
}

// =============================================================================
// PointLight
// =============================================================================

/// An infinitely small emitter: a Dirac in space.
///
/// Invisible to camera and BSDF rays; it contributes only through explicit
/// sampling and photon emission.
pub struct PointLight {
    position: Vec3,
    /// Radiant intensity (flux per solid angle)
    intensity: Vec3,
    est_power: f32,
}

impl PointLight {
    pub fn new(position: Vec3, intensity: Vec3) -> Self {
        Self {
            position,
            intensity,
            est_power: luminance(intensity) * 4.0 * PI,
        }
    }
}

impl Light for PointLight {
    fn sample_li(&self, origin: Vec3) -> LightSample {
        let d = self.position - origin;
        let dist_sq = d.length_squared();
        let distance = dist_sq.sqrt();

        if distance < EPSILON {
            return LightSample::zero();
        }

        LightSample {
            // Inverse square falloff
            radiance: self.intensity / dist_sq,
            direction: d / distance,
            // Deterministic direction once the light is selected
            pdf: 1.0,
            distance,
        }
    }

    fn pdf_value(&self, _origin: Vec3, _wi: Vec3) -> f32 {
        // A random ray never hits a point.
        0.0
    }

    fn emit(&self, total_photons: f32) -> Option<PhotonEmission> {
        Some(PhotonEmission {
            origin: self.position,
            direction: random_unit_vector(),
            // Total flux is 4 pi * intensity
            power: self.intensity * 4.0 * PI / total_photons,
        })
    }

    fn emit_targeted(&self, total_photons: f32, target: &dyn Hittable) -> Option<PhotonEmission> {
        let to_target = target.random_pointing_vector(self.position);
        let dist = to_target.length();
        if dist <= EPSILON {
            return None;
        }
        let direction = to_target / dist;

        let pdf_dir = target.pdf_value(self.position, direction);
        if pdf_dir <= EPSILON {
            return None;
        }

        // (I * 4pi / N) * (1 / (4pi * pdf)) = I / (N * pdf)
        Some(PhotonEmission {
            origin: self.position,
            direction,
            power: self.intensity / (total_photons * pdf_dir),
        })
    }

    fn power(&self) -> f32 {
        self.est_power
    }
}

// =============================================================================
// EnvironmentLight
// =============================================================================

/// An infinite area light wrapping a background texture.
///
/// Image-backed environments precompute a 2D distribution over
/// luminance * sin(theta) so equirectangular area distortion does not
/// over-represent the poles; other textures fall back to uniform spherical
/// sampling.
pub struct EnvironmentLight {
    texture: Arc<dyn Texture>,
    distribution: Option<Distribution2D>,
    est_power: f32,
}

impl EnvironmentLight {
    pub fn new(texture: Arc<dyn Texture>) -> Self {
        Self::build(texture, None)
    }

    /// Importance-sampled environment from an image map.
    pub fn from_image(image: Arc<ImageTexture>) -> Self {
        let w = image.width();
        let h = image.height();

        let distribution = if w > 0 && h > 0 {
            let mut density = vec![0.0f32; w * h];
            for v in 0..h {
                // sin(theta) corrects the equirectangular distortion.
                let vp = (v as f32 + 0.5) / h as f32;
                let sin_theta = (PI * vp).sin();
                for u in 0..w {
                    density[v * w + u] =
                        luminance(image.get_pixel(u as i32, v as i32)) * sin_theta;
                }
            }
            Some(Distribution2D::new(&density, w, h))
        } else {
            None
        };

        Self::build(image, distribution)
    }

    fn build(texture: Arc<dyn Texture>, distribution: Option<Distribution2D>) -> Self {
        let est_power = match &distribution {
            Some(dist) => dist.marginal.func_int * 2.0 * PI * PI,
            None => {
                let center = texture.value(0.5, 0.5, Vec3::ZERO);
                luminance(center) * 4.0 * PI
            }
        };

        Self {
            texture,
            distribution,
            est_power,
        }
    }

    /// Radiance arriving from a direction; used for rays that miss all
    /// geometry.
    pub fn eval(&self, dir: Vec3) -> Vec3 {
        let unit = dir.normalize();
        let (u, v) = get_sphere_uv(unit);
        self.texture.value(u, v, unit)
    }
}

impl Light for EnvironmentLight {
    fn sample_li(&self, _origin: Vec3) -> LightSample {
        if let Some(dist) = &self.distribution {
            let ((u, v), map_pdf) = dist.sample_continuous(random_f32(), random_f32());
            if map_pdf == 0.0 {
                return LightSample::zero();
            }

            let direction = uv_to_sphere(u, v);
            let sin_theta = (v * PI).sin();
            if sin_theta <= 0.0 {
                return LightSample::zero();
            }

            // UV density -> solid-angle density
            let pdf = map_pdf / (2.0 * PI * PI * sin_theta);

            return LightSample {
                radiance: self.texture.value(u, v, direction),
                direction,
                pdf,
                distance: f32::INFINITY,
            };
        }

        // Uniform over the sphere
        let u1 = random_f32();
        let u2 = random_f32();
        let z = 1.0 - 2.0 * u1;
        let r = (1.0 - z * z).max(0.0).sqrt();
        let phi = 2.0 * PI * u2;
        let direction = Vec3::new(r * phi.cos(), r * phi.sin(), z);

        LightSample {
            radiance: self.eval(direction),
            direction,
            pdf: 1.0 / (4.0 * PI),
            distance: f32::INFINITY,
        }
    }

    fn pdf_value(&self, _origin: Vec3, wi: Vec3) -> f32 {
        match &self.distribution {
            Some(dist) => {
                let (u, v) = get_sphere_uv(wi.normalize());
                let sin_theta = (v * PI).sin();
                if sin_theta <= EPSILON {
                    return 0.0;
                }
                dist.pdf(u, v) / (2.0 * PI * PI * sin_theta)
            }
            None => 1.0 / (4.0 * PI),
        }
    }

    fn emit(&self, _total_photons: f32) -> Option<PhotonEmission> {
        // The environment does not participate in photon emission; its
        // contribution is integrated by path sampling with MIS.
        None
    }

    fn power(&self) -> f32 {
        self.est_power
    }
}
