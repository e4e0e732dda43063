//! Texture evaluation: solid colors, procedural patterns and image maps.

use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use prisma_math::sampling::{random_int, random_vec3};
use prisma_math::Vec3;
use thiserror::Error;

/// Errors that can occur while loading texture images.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("failed to decode texture: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A texture maps a surface coordinate (u, v) or a 3D point to a color.
pub trait Texture: Send + Sync {
    /// Sample the color at the given coordinate.
    ///
    /// `p` is the world-space point, used by procedural textures.
    fn value(&self, u: f32, v: f32, p: Vec3) -> Vec3;
}

/// A texture returning a constant color regardless of coordinates.
#[derive(Debug, Clone, Copy)]
pub struct SolidColor {
    color: Vec3,
}

impl SolidColor {
    pub fn new(color: Vec3) -> Self {
        Self { color }
    }

    pub fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(Vec3::new(r, g, b))
    }
}

impl Texture for SolidColor {
    fn value(&self, _u: f32, _v: f32, _p: Vec3) -> Vec3 {
        self.color
    }
}

/// A 3D checkerboard alternating between two sub-textures.
pub struct CheckerTexture {
    even: Arc<dyn Texture>,
    odd: Arc<dyn Texture>,
    scale: f32,
}

impl CheckerTexture {
    pub fn new(even: Arc<dyn Texture>, odd: Arc<dyn Texture>, scale: f32) -> Self {
        Self { even, odd, scale }
    }

    pub fn from_colors(c1: Vec3, c2: Vec3, scale: f32) -> Self {
        Self::new(
            Arc::new(SolidColor::new(c1)),
            Arc::new(SolidColor::new(c2)),
            scale,
        )
    }
}

impl Texture for CheckerTexture {
    fn value(&self, u: f32, v: f32, p: Vec3) -> Vec3 {
        let sines = (self.scale * p.x).sin() * (self.scale * p.y).sin() * (self.scale * p.z).sin();
        if sines < 0.0 {
            self.odd.value(u, v, p)
        } else {
            self.even.value(u, v, p)
        }
    }
}

// =============================================================================
// Perlin noise
// =============================================================================

const POINT_COUNT: usize = 256;

/// Gradient noise generator: random unit gradients on a permuted lattice,
/// trilinearly interpolated with Hermite smoothing.
struct PerlinNoise {
    ranvec: Vec<Vec3>,
    perm_x: Vec<usize>,
    perm_y: Vec<usize>,
    perm_z: Vec<usize>,
}

impl PerlinNoise {
    fn new() -> Self {
        let ranvec = (0..POINT_COUNT)
            .map(|_| random_vec3(-1.0, 1.0).normalize())
            .collect();

        Self {
            ranvec,
            perm_x: Self::generate_perm(),
            perm_y: Self::generate_perm(),
            perm_z: Self::generate_perm(),
        }
    }

    fn generate_perm() -> Vec<usize> {
        let mut p: Vec<usize> = (0..POINT_COUNT).collect();
        for i in (1..POINT_COUNT).rev() {
            let target = random_int(0, i as i32) as usize;
            p.swap(i, target);
        }
        p
    }

    /// Single-frequency noise at a point, roughly in [-1, 1].
    fn noise(&self, p: Vec3) -> f32 {
        let u = p.x - p.x.floor();
        let v = p.y - p.y.floor();
        let w = p.z - p.z.floor();

        let i = p.x.floor() as i32;
        let j = p.y.floor() as i32;
        let k = p.z.floor() as i32;

        let mut c = [[[Vec3::ZERO; 2]; 2]; 2];
        for (di, plane) in c.iter_mut().enumerate() {
            for (dj, row) in plane.iter_mut().enumerate() {
                for (dk, cell) in row.iter_mut().enumerate() {
                    *cell = self.ranvec[self.perm_x[((i + di as i32) & 255) as usize]
                        ^ self.perm_y[((j + dj as i32) & 255) as usize]
                        ^ self.perm_z[((k + dk as i32) & 255) as usize]];
                }
            }
        }

        Self::interp(&c, u, v, w)
    }

    /// Multi-octave turbulence; always positive.
    fn turb(&self, p: Vec3, depth: usize) -> f32 {
        let mut accum = 0.0;
        let mut temp_p = p;
        let mut weight = 1.0;

        for _ in 0..depth {
            accum += weight * self.noise(temp_p);
            weight *= 0.5;
            temp_p *= 2.0;
        }

        accum.abs()
    }

    fn interp(c: &[[[Vec3; 2]; 2]; 2], u: f32, v: f32, w: f32) -> f32 {
        // Hermite smoothing: 3t^2 - 2t^3
        let uu = u * u * (3.0 - 2.0 * u);
        let vv = v * v * (3.0 - 2.0 * v);
        let ww = w * w * (3.0 - 2.0 * w);

        let mut accum = 0.0;
        for i in 0..2 {
            for j in 0..2 {
                for k in 0..2 {
                    let (fi, fj, fk) = (i as f32, j as f32, k as f32);
                    let weight_v = Vec3::new(u - fi, v - fj, w - fk);
                    accum += (fi * uu + (1.0 - fi) * (1.0 - uu))
                        * (fj * vv + (1.0 - fj) * (1.0 - vv))
                        * (fk * ww + (1.0 - fk) * (1.0 - ww))
                        * c[i][j][k].dot(weight_v);
                }
            }
        }
        accum
    }
}

/// Marble-like pattern built from Perlin turbulence.
pub struct PerlinTexture {
    noise: PerlinNoise,
    scale: f32,
}

impl PerlinTexture {
    pub fn new(scale: f32) -> Self {
        Self {
            noise: PerlinNoise::new(),
            scale,
        }
    }
}

impl Texture for PerlinTexture {
    fn value(&self, _u: f32, _v: f32, p: Vec3) -> Vec3 {
        // Wavy strips along Z, perturbed by turbulence, mapped to [0, 1].
        Vec3::ONE * 0.5 * (1.0 + (self.scale * p.z + 10.0 * self.noise.turb(p, 7)).sin())
    }
}

// =============================================================================
// Image textures
// =============================================================================

/// A texture backed by an image file, LDR or HDR, sampled bilinearly.
///
/// Pixels are held as linear RGB floats. A texture that failed to load
/// evaluates to magenta so broken assets are visible in renders instead of
/// aborting them.
pub struct ImageTexture {
    width: usize,
    height: usize,
    data: Vec<Vec3>,
}

impl ImageTexture {
    /// Load from disk, falling back to the magenta debug texture on error.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(texture) => texture,
            Err(err) => {
                log::warn!("could not load texture {}: {err}", path.display());
                Self {
                    width: 0,
                    height: 0,
                    data: Vec::new(),
                }
            }
        }
    }

    /// Load from disk, propagating decode failures.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let img = image::open(path.as_ref())?;

        // HDR formats decode to linear floats already; LDR bytes are
        // scaled to [0, 1].
        let is_hdr = matches!(
            &img,
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)
        );

        let (width, height, data) = if is_hdr {
            let rgb = img.to_rgb32f();
            let (w, h) = rgb.dimensions();
            let data = rgb.pixels().map(|p| Vec3::new(p[0], p[1], p[2])).collect();
            (w as usize, h as usize, data)
        } else {
            let rgb = img.to_rgb8();
            let (w, h) = rgb.dimensions();
            let scale = 1.0 / 255.0;
            let data = rgb
                .pixels()
                .map(|p| Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32) * scale)
                .collect();
            (w as usize, h as usize, data)
        };

        log::debug!(
            "loaded texture {} ({}x{})",
            path.as_ref().display(),
            width,
            height
        );

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build directly from pixel data (used by tests and procedural callers).
    pub fn from_pixels(width: usize, height: usize, data: Vec<Vec3>) -> Self {
        assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Fetch a pixel with clamped coordinates.
    pub fn get_pixel(&self, x: i32, y: i32) -> Vec3 {
        if self.data.is_empty() {
            return Vec3::ZERO;
        }
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        self.data[y * self.width + x]
    }
}

impl Texture for ImageTexture {
    fn value(&self, u: f32, v: f32, _p: Vec3) -> Vec3 {
        if self.data.is_empty() {
            // Missing texture: solid magenta debug color.
            return Vec3::new(1.0, 0.0, 1.0);
        }

        let u = u.clamp(0.0, 1.0);
        let v = 1.0 - v.clamp(0.0, 1.0); // Flip V to image coordinates

        let i = u * self.width as f32;
        let j = v * self.height as f32;

        let x0 = (i - 0.5).floor() as i32;
        let y0 = (j - 0.5).floor() as i32;
        let s = i - 0.5 - x0 as f32;
        let t = j - 0.5 - y0 as f32;

        let c00 = self.get_pixel(x0, y0);
        let c10 = self.get_pixel(x0 + 1, y0);
        let c01 = self.get_pixel(x0, y0 + 1);
        let c11 = self.get_pixel(x0 + 1, y0 + 1);

        let c0 = c00.lerp(c10, s);
        let c1 = c01.lerp(c11, s);
        c0.lerp(c1, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_color() {
        let tex = SolidColor::from_rgb(1.0, 0.5, 0.0);
        assert_eq!(tex.value(0.3, 0.8, Vec3::ZERO), Vec3::new(1.0, 0.5, 0.0));
    }

    #[test]
    fn test_checker_alternates() {
        let tex = CheckerTexture::from_colors(Vec3::ONE, Vec3::ZERO, 10.0);
        let a = tex.value(0.0, 0.0, Vec3::new(0.1, 0.1, 0.1));
        let b = tex.value(0.0, 0.0, Vec3::new(0.1, 0.1, 0.1 + std::f32::consts::PI / 10.0));
        assert_ne!(a, b);
    }

    #[test]
    fn test_perlin_range_and_determinism_per_instance() {
        let tex = PerlinTexture::new(4.0);
        let p = Vec3::new(1.3, 2.7, -0.4);
        let a = tex.value(0.0, 0.0, p);
        let b = tex.value(0.0, 0.0, p);
        assert_eq!(a, b);
        assert!(a.x >= 0.0 && a.x <= 1.0);
    }

    #[test]
    fn test_image_texture_bilinear() {
        // 2x2 texture: left column black, right column white.
        let tex = ImageTexture::from_pixels(
            2,
            2,
            vec![Vec3::ZERO, Vec3::ONE, Vec3::ZERO, Vec3::ONE],
        );

        let left = tex.value(0.0, 0.5, Vec3::ZERO);
        let right = tex.value(1.0, 0.5, Vec3::ZERO);
        let middle = tex.value(0.5, 0.5, Vec3::ZERO);

        assert!(left.x < 0.01);
        assert!(right.x > 0.99);
        assert!((middle.x - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_missing_image_is_magenta() {
        let tex = ImageTexture::new("/definitely/not/a/file.png");
        assert_eq!(tex.value(0.5, 0.5, Vec3::ZERO), Vec3::new(1.0, 0.0, 1.0));
    }
}
