//! Spherical UV mapping and spectral helpers.

use std::f32::consts::PI;

use glam::Vec3;

/// UV coordinates for a point on the unit sphere.
///
/// theta is the angle down from +Y, phi the angle around Y measured so that
/// u increases with longitude: u = phi / 2pi, v = theta / pi.
pub fn get_sphere_uv(p: Vec3) -> (f32, f32) {
    let theta = (-p.y).clamp(-1.0, 1.0).acos();
    let phi = (-p.z).atan2(p.x) + PI;
    (phi / (2.0 * PI), theta / PI)
}

/// Inverse of `get_sphere_uv`: map UV back to a unit direction.
pub fn uv_to_sphere(u: f32, v: f32) -> Vec3 {
    let phi = u * 2.0 * PI;
    let theta = v * PI;
    let sin_theta = theta.sin();
    Vec3::new(-sin_theta * phi.cos(), -theta.cos(), sin_theta * phi.sin())
}

/// Perceptual luminance of a linear RGB color (Rec. 709 weights).
#[inline]
pub fn luminance(c: Vec3) -> f32 {
    0.2126 * c.x + 0.7152 * c.y + 0.0722 * c.z
}

/// Approximate conversion from a wavelength in nanometers to linear RGB.
///
/// Piecewise fit over the visible range [380, 780] with intensity falloff
/// towards both ends of the spectrum. Out-of-range wavelengths map to black.
pub fn wavelength_to_rgb(wavelength: f32) -> Vec3 {
    let (r, g, b) = match wavelength {
        w if (380.0..440.0).contains(&w) => (-(w - 440.0) / (440.0 - 380.0), 0.0, 1.0),
        w if (440.0..490.0).contains(&w) => (0.0, (w - 440.0) / (490.0 - 440.0), 1.0),
        w if (490.0..510.0).contains(&w) => (0.0, 1.0, -(w - 510.0) / (510.0 - 490.0)),
        w if (510.0..580.0).contains(&w) => ((w - 510.0) / (580.0 - 510.0), 1.0, 0.0),
        w if (580.0..645.0).contains(&w) => (1.0, -(w - 645.0) / (645.0 - 580.0), 0.0),
        w if (645.0..=780.0).contains(&w) => (1.0, 0.0, 0.0),
        _ => (0.0, 0.0, 0.0),
    };

    // Fade intensity near the limits of vision.
    let factor = match wavelength {
        w if (380.0..420.0).contains(&w) => 0.3 + 0.7 * (w - 380.0) / (420.0 - 380.0),
        w if (700.0..=780.0).contains(&w) => 0.3 + 0.7 * (780.0 - w) / (780.0 - 700.0),
        w if (420.0..700.0).contains(&w) => 1.0,
        _ => 0.0,
    };

    Vec3::new(r, g, b) * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_uv_round_trip() {
        // For unit vectors away from the poles, uv_to_sphere(get_sphere_uv(v)) == v.
        let dirs = [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.5, 0.5, -0.7).normalize(),
            Vec3::new(-0.3, 0.9, 0.1).normalize(),
        ];

        for dir in dirs {
            let (u, v) = get_sphere_uv(dir);
            assert!((0.0..=1.0).contains(&u), "u out of range: {u}");
            assert!((0.0..=1.0).contains(&v), "v out of range: {v}");
            let back = uv_to_sphere(u, v);
            assert!((back - dir).length() < 1e-4, "{dir:?} -> {back:?}");
        }
    }

    #[test]
    fn test_sphere_uv_known_values() {
        // Bottom pole maps to v = 0, top pole to v = 1.
        let (_, v) = get_sphere_uv(Vec3::new(0.0, -1.0, 0.0));
        assert!(v.abs() < 1e-5);
        let (_, v) = get_sphere_uv(Vec3::new(0.0, 1.0, 0.0));
        assert!((v - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_wavelength_to_rgb_bands() {
        // Deep blue, green, red regions light up the matching channel.
        let blue = wavelength_to_rgb(460.0);
        assert!(blue.z > blue.x && blue.z > 0.5);

        let green = wavelength_to_rgb(540.0);
        assert!(green.y > green.z && green.y > 0.5);

        let red = wavelength_to_rgb(680.0);
        assert!(red.x > red.y && red.x > 0.5);

        // Outside the visible range everything is black.
        assert_eq!(wavelength_to_rgb(300.0), Vec3::ZERO);
        assert_eq!(wavelength_to_rgb(800.0), Vec3::ZERO);
    }

    #[test]
    fn test_wavelength_coverage() {
        // No wavelength inside [380, 780] produces a fully black color.
        let mut w = 380.0f32;
        while w <= 780.0 {
            let c = wavelength_to_rgb(w);
            assert!(c.max_element() > 0.0, "black at {w} nm");
            w += 1.0;
        }
    }

    #[test]
    fn test_luminance() {
        assert!((luminance(Vec3::ONE) - 1.0).abs() < 1e-5);
        assert!(luminance(Vec3::new(0.0, 1.0, 0.0)) > luminance(Vec3::new(1.0, 0.0, 0.0)));
    }
}
