//! Thin-lens perspective camera with defocus blur and a shutter interval.

use prisma_math::sampling::{random_in_unit_disk, random_range};
use prisma_math::{Ray, Vec3};

/// A perspective camera.
///
/// Rays originate on a lens disk of radius aperture/2 and aim at the point
/// on the focal plane corresponding to the pixel, so objects away from the
/// focus distance blur. Ray times are uniform over the shutter interval.
#[derive(Debug, Clone)]
pub struct Camera {
    origin: Vec3,
    lower_left_corner: Vec3,
    horizontal: Vec3,
    vertical: Vec3,
    u: Vec3,
    v: Vec3,
    lens_radius: f32,
    time0: f32,
    time1: f32,
}

impl Camera {
    /// Pinhole camera with a closed shutter interval at t = 0.
    pub fn new(lookfrom: Vec3, lookat: Vec3, vup: Vec3, vfov: f32, aspect_ratio: f32) -> Self {
        Self::with_lens(
            lookfrom,
            lookat,
            vup,
            vfov,
            aspect_ratio,
            0.0,
            (lookfrom - lookat).length(),
        )
    }

    /// Thin-lens camera. `vfov` is the vertical field of view in degrees.
    pub fn with_lens(
        lookfrom: Vec3,
        lookat: Vec3,
        vup: Vec3,
        vfov: f32,
        aspect_ratio: f32,
        aperture: f32,
        focus_dist: f32,
    ) -> Self {
        Self::with_shutter(
            lookfrom,
            lookat,
            vup,
            vfov,
            aspect_ratio,
            aperture,
            focus_dist,
            0.0,
            0.0,
        )
    }

    /// Full constructor including the shutter interval [time0, time1].
    #[allow(clippy::too_many_arguments)]
    pub fn with_shutter(
        lookfrom: Vec3,
        lookat: Vec3,
        vup: Vec3,
        vfov: f32,
        aspect_ratio: f32,
        aperture: f32,
        focus_dist: f32,
        time0: f32,
        time1: f32,
    ) -> Self {
        let theta = vfov.to_radians();
        let h = (theta / 2.0).tan();
        let viewport_height = 2.0 * h;
        let viewport_width = aspect_ratio * viewport_height;

        let w = (lookfrom - lookat).normalize();
        let u = vup.cross(w).normalize();
        let v = w.cross(u);

        let horizontal = focus_dist * viewport_width * u;
        let vertical = focus_dist * viewport_height * v;
        let lower_left_corner = lookfrom - horizontal / 2.0 - vertical / 2.0 - focus_dist * w;

        Self {
            origin: lookfrom,
            lower_left_corner,
            horizontal,
            vertical,
            u,
            v,
            lens_radius: aperture / 2.0,
            time0,
            time1,
        }
    }

    /// Generate a ray through NDC position (s, t) in [0, 1]^2.
    pub fn get_ray(&self, s: f32, t: f32) -> Ray {
        let lens_point = if self.lens_radius > 0.0 {
            let rd = self.lens_radius * random_in_unit_disk();
            self.origin + self.u * rd.x + self.v * rd.y
        } else {
            self.origin
        };

        // Aim at the focal-plane point regardless of the lens offset.
        let target = self.lower_left_corner + s * self.horizontal + t * self.vertical;
        let time = if self.time1 > self.time0 {
            random_range(self.time0, self.time1)
        } else {
            self.time0
        };

        Ray::new(lens_point, target - lens_point, time)
    }
}
