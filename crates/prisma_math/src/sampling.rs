//! Random sampling helpers.
//!
//! All functions draw from `rand::thread_rng()`, a thread-local generator
//! with an independent seed per thread, so worker threads never contend on
//! shared RNG state.

use std::f32::consts::PI;

use glam::Vec3;
use rand::Rng;

/// Random f32 in [0, 1).
#[inline]
pub fn random_f32() -> f32 {
    rand::thread_rng().gen()
}

/// Random f32 in [min, max).
#[inline]
pub fn random_range(min: f32, max: f32) -> f32 {
    min + (max - min) * random_f32()
}

/// Random integer in [min, max] (inclusive).
#[inline]
pub fn random_int(min: i32, max: i32) -> i32 {
    rand::thread_rng().gen_range(min..=max)
}

/// Random vector with components in [min, max).
#[inline]
pub fn random_vec3(min: f32, max: f32) -> Vec3 {
    Vec3::new(
        random_range(min, max),
        random_range(min, max),
        random_range(min, max),
    )
}

/// Random vector inside the unit sphere (rejection sampling).
pub fn random_in_unit_sphere() -> Vec3 {
    loop {
        let p = random_vec3(-1.0, 1.0);
        if p.length_squared() < 1.0 {
            return p;
        }
    }
}

/// Random unit vector, uniformly distributed over the sphere surface.
#[inline]
pub fn random_unit_vector() -> Vec3 {
    random_in_unit_sphere().normalize()
}

/// Random point in the unit disk on the XY plane (z = 0).
pub fn random_in_unit_disk() -> Vec3 {
    loop {
        let p = Vec3::new(random_range(-1.0, 1.0), random_range(-1.0, 1.0), 0.0);
        if p.length_squared() < 1.0 {
            return p;
        }
    }
}

/// Cosine-weighted direction around +Z in local space.
///
/// PDF = cos(theta) / pi.
pub fn random_cosine_direction() -> Vec3 {
    let r1 = random_f32();
    let r2 = random_f32();

    let phi = 2.0 * PI * r1;
    let sqrt_r2 = r2.sqrt();
    let x = phi.cos() * sqrt_r2;
    let y = phi.sin() * sqrt_r2;
    let z = (1.0 - r2).sqrt();

    Vec3::new(x, y, z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ranges() {
        for _ in 0..1000 {
            let x = random_f32();
            assert!((0.0..1.0).contains(&x));

            let y = random_range(2.0, 5.0);
            assert!((2.0..5.0).contains(&y));

            let i = random_int(0, 3);
            assert!((0..=3).contains(&i));
        }
    }

    #[test]
    fn test_random_unit_vector_is_unit() {
        for _ in 0..100 {
            let v = random_unit_vector();
            assert!((v.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_random_in_unit_disk_is_planar() {
        for _ in 0..100 {
            let p = random_in_unit_disk();
            assert_eq!(p.z, 0.0);
            assert!(p.length_squared() < 1.0);
        }
    }

    #[test]
    fn test_cosine_direction_mean() {
        // E[cos(theta)] for a cosine-weighted hemisphere is 2/3.
        let n = 20_000;
        let mean: f32 = (0..n).map(|_| random_cosine_direction().z).sum::<f32>() / n as f32;
        assert!((mean - 2.0 / 3.0).abs() < 0.02, "mean = {mean}");
    }
}
