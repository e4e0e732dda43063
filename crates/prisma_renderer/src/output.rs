//! Image output: tonemapping, sample-count heatmaps and PNG snapshots.

use std::path::{Path, PathBuf};

use image::RgbImage;
use prisma_math::Vec3;

/// Tonemap a linear HDR buffer to 8-bit RGB.
///
/// Gamma ~2.0 by component-wise square root, then clamp to [0, 1].
pub fn tonemap_to_rgb8(pixels: &[Vec3]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() * 3);
    for color in pixels {
        for channel in [color.x, color.y, color.z] {
            let c = if channel > 0.0 { channel.sqrt() } else { 0.0 };
            out.push((255.999 * c.clamp(0.0, 1.0)) as u8);
        }
    }
    out
}

/// Color the per-pixel sample counts: red where many samples were spent,
/// green where few were needed.
pub fn heatmap_to_rgb8(counts: &[u32]) -> Vec<u8> {
    let max = counts.iter().copied().max().unwrap_or(1).max(1) as f32;

    let mut out = Vec::with_capacity(counts.len() * 3);
    for &count in counts {
        let t = count as f32 / max;
        out.push((255.0 * t) as u8);
        out.push((255.0 * (1.0 - t)) as u8);
        out.push(0);
    }
    out
}

/// Write an RGB8 buffer as a PNG.
pub fn write_png(
    path: impl AsRef<Path>,
    width: usize,
    height: usize,
    pixels: &[u8],
) -> Result<(), image::ImageError> {
    let image = RgbImage::from_raw(width as u32, height as u32, pixels.to_vec())
        .expect("pixel buffer does not match dimensions");
    image.save(path.as_ref())
}

/// Snapshot filename:
/// `scene_<id>_<output|heatmap>_<tag>_samples_<NNNNN|latest>.png`.
pub(crate) fn snapshot_filename(
    dir: &Path,
    scene_id: u32,
    kind: &str,
    tag: &str,
    samples: Option<u32>,
) -> PathBuf {
    let suffix = match samples {
        Some(n) => format!("{n:05}"),
        None => "latest".to_string(),
    };
    dir.join(format!("scene_{scene_id}_{kind}_{tag}_samples_{suffix}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tonemap_gamma() {
        let pixels = vec![Vec3::ZERO, Vec3::splat(0.25), Vec3::ONE, Vec3::splat(9.0)];
        let bytes = tonemap_to_rgb8(&pixels);
        assert_eq!(bytes.len(), 12);

        assert_eq!(bytes[0], 0); // black stays black
        assert_eq!(bytes[3], 127); // sqrt(0.25) = 0.5
        assert_eq!(bytes[6], 255); // white
        assert_eq!(bytes[9], 255); // overbright clamps
    }

    #[test]
    fn test_heatmap_polarity() {
        let bytes = heatmap_to_rgb8(&[0, 50, 100]);
        // Few samples: green. Many samples: red.
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[1], 255);
        assert_eq!(bytes[6], 255);
        assert_eq!(bytes[7], 0);
    }

    #[test]
    fn test_snapshot_filename() {
        let latest = snapshot_filename(Path::new("out"), 2, "output", "PT", None);
        assert_eq!(
            latest.to_string_lossy(),
            "out/scene_2_output_PT_samples_latest.png"
        );

        let milestone = snapshot_filename(Path::new("out"), 2, "heatmap", "PM", Some(128));
        assert_eq!(
            milestone.to_string_lossy(),
            "out/scene_2_heatmap_PM_samples_00128.png"
        );
    }

    #[test]
    fn test_write_png_roundtrip() {
        let dir = std::env::temp_dir().join("prisma_output_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tiny.png");

        let pixels = tonemap_to_rgb8(&vec![Vec3::splat(0.5); 4]);
        write_png(&path, 2, 2, &pixels).unwrap();

        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back.dimensions(), (2, 2));
    }
}
