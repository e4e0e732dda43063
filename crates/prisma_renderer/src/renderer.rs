//! Adaptive, batched pixel scheduler.
//!
//! Rendering proceeds in batches: every still-active pixel receives a
//! fixed number of additional samples per batch, rows are processed in
//! parallel, and a pixel retires once the standard error of its luminance
//! falls under the configured threshold. A snapshot of the image (and a
//! sample-count heatmap) is written after every batch.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use prisma_math::sampling::random_f32;
use prisma_math::{luminance, Vec3};

use crate::camera::Camera;
use crate::integrator::Integrator;
use crate::output::{heatmap_to_rgb8, snapshot_filename, tonemap_to_rgb8, write_png};
use crate::scene::Scene;

/// Render settings for the adaptive scheduler.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub width: usize,
    pub height: usize,
    /// Samples before a pixel may be declared converged
    pub min_samples: u32,
    /// Hard per-pixel sample budget
    pub max_samples: u32,
    /// Additional samples per pixel per batch
    pub batch_size: u32,
    /// Standard-error threshold for convergence
    pub noise_threshold: f32,
    /// Identifier used in snapshot filenames
    pub scene_id: u32,
    /// Where to write snapshots; None disables them
    pub output_dir: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 450,
            min_samples: 32,
            max_samples: 1024,
            batch_size: 16,
            noise_threshold: 0.01,
            scene_id: 0,
            output_dir: None,
        }
    }
}

/// Per-pixel accumulation state. Rows are partitioned across workers, so
/// no synchronization is needed on these.
#[derive(Debug, Clone, Copy, Default)]
struct PixelAccum {
    color_sum: Vec3,
    lum_sq_sum: f32,
    samples: u32,
    converged: bool,
}

impl PixelAccum {
    fn mean(&self) -> Vec3 {
        if self.samples == 0 {
            Vec3::ZERO
        } else {
            self.color_sum / self.samples as f32
        }
    }

    /// Standard error of the luminance mean.
    fn standard_error(&self) -> f32 {
        if self.samples == 0 {
            return f32::INFINITY;
        }
        let n = self.samples as f32;
        let mean = luminance(self.color_sum) / n;
        let variance = (self.lum_sq_sum / n - mean * mean).abs();
        (variance / n).sqrt()
    }
}

/// The final linear HDR image plus the per-pixel sample counts.
pub struct RenderResult {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Vec3>,
    pub sample_counts: Vec<u32>,
}

pub struct Renderer<'a> {
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    pub integrator: &'a dyn Integrator,
    pub config: RenderConfig,
}

impl<'a> Renderer<'a> {
    pub fn new(
        scene: &'a Scene,
        camera: &'a Camera,
        integrator: &'a dyn Integrator,
        config: RenderConfig,
    ) -> Self {
        Self {
            scene,
            camera,
            integrator,
            config,
        }
    }

    pub fn render(&self) -> RenderResult {
        let width = self.config.width;
        let height = self.config.height;

        let mut accum = vec![PixelAccum::default(); width * height];
        let active = AtomicUsize::new(width * height);

        let mut total_samples = 0u32;
        let mut next_milestone = self.config.min_samples.max(1);

        while total_samples < self.config.max_samples && active.load(Ordering::Relaxed) > 0 {
            let batch = self
                .config
                .batch_size
                .min(self.config.max_samples - total_samples);

            // Each worker owns whole rows for the duration of the batch.
            accum
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, pixel) in row.iter_mut().enumerate() {
                        if pixel.converged {
                            continue;
                        }

                        for _ in 0..batch {
                            let s = (x as f32 + random_f32()) / (width - 1) as f32;
                            let t = ((height - 1 - y) as f32 + random_f32())
                                / (height - 1) as f32;

                            let ray = self.camera.get_ray(s, t);
                            let mut l = self.integrator.li(&ray, self.scene);
                            if !l.is_finite() {
                                l = Vec3::ZERO;
                            }

                            pixel.color_sum += l;
                            let lum = luminance(l);
                            pixel.lum_sq_sum += lum * lum;
                            pixel.samples += 1;
                        }

                        if pixel.samples >= self.config.min_samples
                            && pixel.standard_error() < self.config.noise_threshold
                        {
                            pixel.converged = true;
                            active.fetch_sub(1, Ordering::Relaxed);
                        }
                    }
                });

            total_samples += batch;

            log::info!(
                "batch done: {total_samples} samples, {} active pixels",
                active.load(Ordering::Relaxed)
            );

            // Snapshots are written by the main thread between batches.
            if self.config.output_dir.is_some() {
                self.write_snapshots(&accum, None);
                if total_samples >= next_milestone {
                    self.write_snapshots(&accum, Some(total_samples));
                    next_milestone *= 2;
                }
            }
        }

        let pixels: Vec<Vec3> = accum.iter().map(PixelAccum::mean).collect();
        let sample_counts: Vec<u32> = accum.iter().map(|p| p.samples).collect();

        RenderResult {
            width,
            height,
            pixels,
            sample_counts,
        }
    }

    fn write_snapshots(&self, accum: &[PixelAccum], milestone: Option<u32>) {
        let dir = match &self.config.output_dir {
            Some(dir) => dir,
            None => return,
        };
        if let Err(err) = std::fs::create_dir_all(dir) {
            log::warn!("cannot create snapshot directory {}: {err}", dir.display());
            return;
        }

        let pixels: Vec<Vec3> = accum.iter().map(PixelAccum::mean).collect();
        let counts: Vec<u32> = accum.iter().map(|p| p.samples).collect();

        let tag = self.integrator.tag();
        let output_path =
            snapshot_filename(dir, self.config.scene_id, "output", tag, milestone);
        let heatmap_path =
            snapshot_filename(dir, self.config.scene_id, "heatmap", tag, milestone);

        let rgb = tonemap_to_rgb8(&pixels);
        if let Err(err) = write_png(&output_path, self.config.width, self.config.height, &rgb) {
            log::warn!("snapshot write failed: {err}");
        }

        let heat = heatmap_to_rgb8(&counts);
        if let Err(err) = write_png(&heatmap_path, self.config.width, self.config.height, &heat) {
            log::warn!("heatmap write failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::integrator::PathIntegrator;
    use crate::material::{DiffuseLight, Lambertian};
    use crate::sphere::Sphere;

    fn tiny_scene() -> Scene {
        let mut scene = Scene::new();
        scene.add(Box::new(Sphere::new(
            Vec3::new(0.0, 0.0, -3.0),
            1.0,
            Arc::new(Lambertian::new(Vec3::splat(0.5))),
        )));
        scene.add(Box::new(Sphere::new(
            Vec3::new(0.0, 4.0, -3.0),
            1.0,
            Arc::new(DiffuseLight::new(Vec3::splat(4.0))),
        )));
        scene.build_bvh(0.0, 1.0);
        scene
    }

    fn tiny_config() -> RenderConfig {
        RenderConfig {
            width: 8,
            height: 8,
            min_samples: 4,
            max_samples: 32,
            batch_size: 4,
            noise_threshold: 0.05,
            scene_id: 0,
            output_dir: None,
        }
    }

    #[test]
    fn test_render_produces_finite_image() {
        let scene = tiny_scene();
        let camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y, 60.0, 1.0);
        let integrator = PathIntegrator::new(8);
        let renderer = Renderer::new(&scene, &camera, &integrator, tiny_config());

        let result = renderer.render();
        assert_eq!(result.pixels.len(), 64);
        assert_eq!(result.sample_counts.len(), 64);

        for p in &result.pixels {
            assert!(p.is_finite());
            assert!(p.min_element() >= 0.0);
        }
    }

    #[test]
    fn test_sample_counts_bounded() {
        let scene = tiny_scene();
        let camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y, 60.0, 1.0);
        let integrator = PathIntegrator::new(8);
        let renderer = Renderer::new(&scene, &camera, &integrator, tiny_config());

        let result = renderer.render();
        for &count in &result.sample_counts {
            assert!(count >= 4, "pixel under-sampled: {count}");
            assert!(count <= 32, "pixel over-sampled: {count}");
        }
    }

    #[test]
    fn test_adaptive_sampling_concentrates_work() {
        // A black-background scene: empty pixels converge immediately,
        // pixels covering the lit sphere edge need more samples.
        let scene = tiny_scene();
        let camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y, 60.0, 1.0);
        let integrator = PathIntegrator::new(8);

        let config = RenderConfig {
            width: 16,
            height: 16,
            min_samples: 4,
            max_samples: 256,
            batch_size: 8,
            noise_threshold: 0.02,
            ..tiny_config()
        };
        let renderer = Renderer::new(&scene, &camera, &integrator, config);
        let result = renderer.render();

        let min = result.sample_counts.iter().min().copied().unwrap();
        let max = result.sample_counts.iter().max().copied().unwrap();
        assert!(
            max > min,
            "adaptive sampling spent uniform effort: min {min}, max {max}"
        );
    }

    #[test]
    fn test_snapshots_written() {
        let dir = std::env::temp_dir().join("prisma_renderer_snapshots");
        let _ = std::fs::remove_dir_all(&dir);

        let scene = tiny_scene();
        let camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y, 60.0, 1.0);
        let integrator = PathIntegrator::new(4);

        let config = RenderConfig {
            output_dir: Some(dir.clone()),
            scene_id: 7,
            ..tiny_config()
        };
        let renderer = Renderer::new(&scene, &camera, &integrator, config);
        renderer.render();

        assert!(dir.join("scene_7_output_PT_samples_latest.png").exists());
        assert!(dir.join("scene_7_heatmap_PT_samples_latest.png").exists());
        // At least the first milestone (min_samples = 4) was retained.
        assert!(dir.join("scene_7_output_PT_samples_00004.png").exists());
    }
}
