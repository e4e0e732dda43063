//! Material trait for surface scattering.
//!
//! Materials decide how a ray continues after a hit (sampling), how much
//! light a given pair of directions exchanges (evaluation), and how likely
//! the sampled direction was (pdf). Emissive and transparency queries let
//! the scene promote lights and trace tinted shadow rays.

use std::f32::consts::PI;
use std::sync::Arc;

use prisma_core::{SolidColor, Texture};
use prisma_math::sampling::{
    random_cosine_direction, random_f32, random_in_unit_sphere, random_range, random_unit_vector,
};
use prisma_math::{near_zero, wavelength_to_rgb, Onb, Ray, Vec3, EPSILON};

use crate::hittable::HitRecord;

/// Color type alias (linear RGB, typically 0-1 for albedos)
pub type Color = Vec3;

/// Result of scattering a ray off a material.
///
/// Specular materials carry a delta distribution: `pdf` is 0 and the
/// attenuation applies directly. Non-specular materials report the finite
/// density of the sampled direction. The shading normal may differ from the
/// geometric normal when a normal map perturbed it.
#[derive(Debug, Clone, Copy)]
pub struct ScatterRecord {
    /// The outgoing ray
    pub ray: Ray,
    /// Color attenuation (albedo at the hit point)
    pub attenuation: Color,
    /// Density of the sampled direction; 0 for delta distributions
    pub pdf: f32,
    /// True for mirror-like scattering (metal, glass)
    pub specular: bool,
    /// Shading normal, possibly perturbed by a normal map
    pub shading_normal: Vec3,
}

/// Trait for materials that describe how light interacts with surfaces.
pub trait Material: Send + Sync {
    /// Scatter an incoming ray.
    ///
    /// Returns Some(ScatterRecord) if the ray scatters, or None if absorbed.
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord) -> Option<ScatterRecord>;

    /// Evaluate the BRDF for a given outgoing direction (used by NEE).
    ///
    /// Delta materials cannot be evaluated and return zero.
    fn eval(&self, _ray_in: &Ray, _rec: &HitRecord, _scattered: &Ray, _shading_normal: Vec3) -> Color {
        Color::ZERO
    }

    /// Density the sampler would assign to `scattered` (used by MIS).
    fn scattering_pdf(
        &self,
        _ray_in: &Ray,
        _rec: &HitRecord,
        _scattered: &Ray,
        _shading_normal: Vec3,
    ) -> f32 {
        0.0
    }

    /// Emitted radiance. Black for non-emitters.
    fn emitted(&self, _u: f32, _v: f32, _p: Vec3) -> Color {
        Color::ZERO
    }

    /// True if this material emits light; the scene promotes such objects
    /// to area lights.
    fn is_emissive(&self) -> bool {
        false
    }

    /// True for caustic-casting materials (glass, mirror); the photon
    /// integrator aims caustic photons at objects carrying them.
    fn is_specular(&self) -> bool {
        false
    }

    /// True if shadow rays may pass through, attenuated by
    /// `evaluate_transmission`. Metal is specular but not transparent.
    fn is_transparent(&self) -> bool {
        false
    }

    /// Attenuation applied to a shadow ray crossing this surface.
    fn evaluate_transmission(&self, _rec: &HitRecord) -> Color {
        Color::ZERO
    }
}

// =============================================================================
// Lambertian
// =============================================================================

/// Lambertian (diffuse) material with optional tangent-space normal map.
pub struct Lambertian {
    albedo: Arc<dyn Texture>,
    normal_map: Option<Arc<dyn Texture>>,
}

impl Lambertian {
    pub fn new(albedo: Color) -> Self {
        Self::from_texture(Arc::new(SolidColor::new(albedo)))
    }

    pub fn from_texture(albedo: Arc<dyn Texture>) -> Self {
        Self {
            albedo,
            normal_map: None,
        }
    }

    pub fn with_normal_map(mut self, normal_map: Arc<dyn Texture>) -> Self {
        self.normal_map = Some(normal_map);
        self
    }

    /// Shading normal after the optional normal map perturbation.
    fn shading_normal(&self, rec: &HitRecord) -> Vec3 {
        match &self.normal_map {
            Some(map) => {
                // [0, 1] texel -> [-1, 1] tangent-space vector
                let local_n = 2.0 * map.value(rec.u, rec.v, rec.p) - Vec3::ONE;
                let tbn = Onb::from_normal_tangent(rec.normal, rec.tangent);
                tbn.local(local_n).normalize()
            }
            None => rec.normal,
        }
    }
}

impl Material for Lambertian {
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord) -> Option<ScatterRecord> {
        let shading_normal = self.shading_normal(rec);

        // Cosine-weighted hemisphere around the shading normal.
        let uvw = Onb::from_normal(shading_normal);
        let direction = uvw.local(random_cosine_direction()).normalize();

        let ray = Ray::new(rec.p, direction, ray_in.time());
        let pdf = shading_normal.dot(direction) / PI;

        Some(ScatterRecord {
            ray,
            attenuation: self.albedo.value(rec.u, rec.v, rec.p),
            pdf,
            specular: false,
            shading_normal,
        })
    }

    fn eval(&self, _ray_in: &Ray, rec: &HitRecord, scattered: &Ray, shading_normal: Vec3) -> Color {
        let cos_theta = shading_normal.dot(scattered.direction());
        if cos_theta <= 0.0 {
            return Color::ZERO;
        }
        self.albedo.value(rec.u, rec.v, rec.p) / PI
    }

    fn scattering_pdf(
        &self,
        _ray_in: &Ray,
        _rec: &HitRecord,
        scattered: &Ray,
        shading_normal: Vec3,
    ) -> f32 {
        let cosine = shading_normal.dot(scattered.direction());
        if cosine < 0.0 {
            0.0
        } else {
            cosine / PI
        }
    }
}

// =============================================================================
// Metal
// =============================================================================

/// Metal (specular) material: mirror reflection with optional fuzz.
pub struct Metal {
    albedo: Arc<dyn Texture>,
    fuzz: f32,
}

impl Metal {
    /// - `albedo`: reflection color
    /// - `fuzz`: roughness in [0, 1]; 0 is a perfect mirror
    pub fn new(albedo: Color, fuzz: f32) -> Self {
        Self::from_texture(Arc::new(SolidColor::new(albedo)), fuzz)
    }

    pub fn from_texture(albedo: Arc<dyn Texture>, fuzz: f32) -> Self {
        Self {
            albedo,
            fuzz: fuzz.clamp(0.0, 1.0),
        }
    }
}

impl Material for Metal {
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord) -> Option<ScatterRecord> {
        let reflected = reflect(ray_in.direction(), rec.normal);

        let mut direction = reflected + self.fuzz * random_in_unit_sphere();
        if near_zero(direction) {
            direction = reflected;
        }

        // No scatter if the fuzzed direction falls below the surface.
        if direction.dot(rec.normal) <= 0.0 {
            return None;
        }

        Some(ScatterRecord {
            ray: Ray::new(rec.p, direction, ray_in.time()),
            attenuation: self.albedo.value(rec.u, rec.v, rec.p),
            pdf: 0.0,
            specular: true,
            shading_normal: rec.normal,
        })
    }

    fn is_specular(&self) -> bool {
        true
    }
}

// =============================================================================
// Dielectric
// =============================================================================

/// Dielectric material (glass, water, diamond): reflection and refraction
/// selected by Schlick's Fresnel approximation, with total internal
/// reflection handled.
pub struct Dielectric {
    albedo: Color,
    /// Index of refraction (glass 1.5, water 1.33, diamond 2.4)
    ior: f32,
}

impl Dielectric {
    pub fn new(albedo: Color, ior: f32) -> Self {
        Self { albedo, ior }
    }
}

impl Material for Dielectric {
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord) -> Option<ScatterRecord> {
        // Entering: air -> glass. Exiting: glass -> air.
        let refraction_ratio = if rec.front_face {
            1.0 / self.ior
        } else {
            self.ior
        };

        let unit_direction = ray_in.direction();
        let cos_theta = (-unit_direction).dot(rec.normal).min(1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

        let cannot_refract = refraction_ratio * sin_theta > 1.0;

        let direction = if cannot_refract || schlick(cos_theta, refraction_ratio) > random_f32() {
            reflect(unit_direction, rec.normal)
        } else {
            refract(unit_direction, rec.normal, refraction_ratio)
        };

        Some(ScatterRecord {
            ray: Ray::with_wavelength(rec.p, direction, ray_in.time(), ray_in.wavelength()),
            attenuation: self.albedo,
            pdf: 0.0,
            specular: true,
            shading_normal: rec.normal,
        })
    }

    fn is_specular(&self) -> bool {
        true
    }

    fn is_transparent(&self) -> bool {
        true
    }

    fn evaluate_transmission(&self, _rec: &HitRecord) -> Color {
        self.albedo
    }
}

// =============================================================================
// DispersiveGlass
// =============================================================================

/// A dielectric with chromatic dispersion via stochastic spectral sampling.
///
/// White rays are assigned a random wavelength in [380, 780] nm and tinted
/// by its RGB response; monochromatic rays keep their wavelength. The index
/// of refraction follows Cauchy's equation n = A + B / lambda_um^2.
pub struct DispersiveGlass {
    albedo: Color,
    cauchy_a: f32,
    cauchy_b: f32,
}

impl DispersiveGlass {
    /// For borosilicate glass (BK7): A ~ 1.5046, B ~ 0.0042.
    pub fn new(albedo: Color, cauchy_a: f32, cauchy_b: f32) -> Self {
        Self {
            albedo,
            cauchy_a,
            cauchy_b,
        }
    }
}

impl Material for DispersiveGlass {
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord) -> Option<ScatterRecord> {
        let (wavelength, attenuation) = if ray_in.wavelength() <= EPSILON {
            let lambda = random_range(380.0, 780.0);
            // The factor 3 compensates for the uniform wavelength sampling
            // density so that integrating over the spectrum stays white.
            (lambda, wavelength_to_rgb(lambda) * self.albedo * 3.0)
        } else {
            // Already monochromatic; keep the tint from the first bounce.
            (ray_in.wavelength(), Color::ONE)
        };

        let lambda_um = wavelength / 1000.0;
        let ior = self.cauchy_a + self.cauchy_b / (lambda_um * lambda_um);

        let refraction_ratio = if rec.front_face { 1.0 / ior } else { ior };

        let unit_direction = ray_in.direction();
        let cos_theta = (-unit_direction).dot(rec.normal).min(1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

        let cannot_refract = refraction_ratio * sin_theta > 1.0;
        let direction = if cannot_refract || schlick(cos_theta, refraction_ratio) > random_f32() {
            reflect(unit_direction, rec.normal)
        } else {
            refract(unit_direction, rec.normal, refraction_ratio)
        };

        Some(ScatterRecord {
            ray: Ray::with_wavelength(rec.p, direction, ray_in.time(), wavelength),
            attenuation,
            pdf: 0.0,
            specular: true,
            shading_normal: rec.normal,
        })
    }

    fn is_specular(&self) -> bool {
        true
    }

    fn is_transparent(&self) -> bool {
        true
    }

    fn evaluate_transmission(&self, _rec: &HitRecord) -> Color {
        self.albedo
    }
}

// =============================================================================
// DiffuseLight
// =============================================================================

/// A material that emits light and does not scatter.
pub struct DiffuseLight {
    emit: Arc<dyn Texture>,
}

impl DiffuseLight {
    pub fn new(emit: Color) -> Self {
        Self::from_texture(Arc::new(SolidColor::new(emit)))
    }

    pub fn from_texture(emit: Arc<dyn Texture>) -> Self {
        Self { emit }
    }
}

impl Material for DiffuseLight {
    fn scatter(&self, _ray_in: &Ray, _rec: &HitRecord) -> Option<ScatterRecord> {
        None
    }

    fn emitted(&self, u: f32, v: f32, p: Vec3) -> Color {
        self.emit.value(u, v, p)
    }

    fn is_emissive(&self) -> bool {
        true
    }
}

// =============================================================================
// Isotropic
// =============================================================================

/// Isotropic phase function for participating media: scatters uniformly
/// over the full sphere. Optionally emissive for glowing volumes.
pub struct Isotropic {
    albedo: Arc<dyn Texture>,
    emit: Option<Arc<dyn Texture>>,
}

impl Isotropic {
    pub fn new(albedo: Color) -> Self {
        Self::from_texture(Arc::new(SolidColor::new(albedo)))
    }

    pub fn from_texture(albedo: Arc<dyn Texture>) -> Self {
        Self {
            albedo,
            emit: None,
        }
    }

    /// A glowing medium.
    pub fn emissive(albedo: Color, emit: Color) -> Self {
        Self {
            albedo: Arc::new(SolidColor::new(albedo)),
            emit: Some(Arc::new(SolidColor::new(emit))),
        }
    }
}

impl Material for Isotropic {
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord) -> Option<ScatterRecord> {
        // Uniform over the sphere: the normal does not constrain the
        // scattering direction inside a medium.
        let direction = random_unit_vector();

        Some(ScatterRecord {
            ray: Ray::with_wavelength(rec.p, direction, ray_in.time(), ray_in.wavelength()),
            attenuation: self.albedo.value(rec.u, rec.v, rec.p),
            pdf: 1.0 / (4.0 * PI),
            specular: false,
            shading_normal: rec.normal,
        })
    }

    fn eval(&self, _ray_in: &Ray, rec: &HitRecord, _scattered: &Ray, _shading_normal: Vec3) -> Color {
        self.albedo.value(rec.u, rec.v, rec.p) / (4.0 * PI)
    }

    fn scattering_pdf(
        &self,
        _ray_in: &Ray,
        _rec: &HitRecord,
        _scattered: &Ray,
        _shading_normal: Vec3,
    ) -> f32 {
        1.0 / (4.0 * PI)
    }

    fn emitted(&self, u: f32, v: f32, p: Vec3) -> Color {
        match &self.emit {
            Some(tex) => tex.value(u, v, p),
            None => Color::ZERO,
        }
    }

    fn is_emissive(&self) -> bool {
        self.emit.is_some()
    }
}

// =============================================================================
// Helper functions
// =============================================================================

/// Reflect a vector about a normal.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a unit vector through a surface with the given eta ratio.
#[inline]
pub fn refract(uv: Vec3, n: Vec3, etai_over_etat: f32) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    r_out_perp + r_out_parallel
}

/// Schlick's approximation of the Fresnel reflectance.
#[inline]
pub fn schlick(cosine: f32, ref_idx: f32) -> f32 {
    let r0 = ((1.0 - ref_idx) / (1.0 + ref_idx)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

/// Maximum channel of a color; used for Russian roulette survival.
#[inline]
pub fn max_channel(c: Color) -> f32 {
    c.x.max(c.y).max(c.z)
}

/// Clamp a contribution's magnitude to a ceiling; suppresses fireflies.
pub fn clamp_radiance(l: Vec3, limit: f32) -> Vec3 {
    let magnitude = l.length();
    if magnitude > limit {
        l * (limit / magnitude)
    } else {
        l
    }
}
