//! Cornell box with a glass sphere, rendered with the path tracer and the
//! photon mapper side by side.
//!
//! Run with `cargo run --release --example cornell`. Images land in
//! `render_out/`.

use std::sync::Arc;

use anyhow::Result;
use prisma_renderer::{
    Camera, Dielectric, DiffuseLight, Lambertian, PathIntegrator, PhotonIntegrator,
    PhotonMappingConfig, RenderConfig, Renderer, Scene, Sphere, Triangle, Vec3,
};

/// The classic box: red and green walls, white floor/ceiling/back, an area
/// light in the ceiling and a glass sphere on the floor.
fn build_scene() -> Scene {
    let mut scene = Scene::new();

    let red = Arc::new(Lambertian::new(Vec3::new(0.65, 0.05, 0.05)));
    let white = Arc::new(Lambertian::new(Vec3::splat(0.73)));
    let green = Arc::new(Lambertian::new(Vec3::new(0.12, 0.45, 0.15)));
    let light = Arc::new(DiffuseLight::new(Vec3::splat(15.0)));
    let glass = Arc::new(Dielectric::new(Vec3::ONE, 1.5));

    let quad = |scene: &mut Scene, a: Vec3, b: Vec3, c: Vec3, d: Vec3, m: Arc<Lambertian>| {
        scene.add(Box::new(Triangle::new(a, b, c, m.clone())));
        scene.add(Box::new(Triangle::new(a, c, d, m)));
    };

    let s = 555.0;
    // Floor, ceiling, back wall
    quad(
        &mut scene,
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(s, 0.0, 0.0),
        Vec3::new(s, 0.0, s),
        Vec3::new(0.0, 0.0, s),
        white.clone(),
    );
    quad(
        &mut scene,
        Vec3::new(0.0, s, 0.0),
        Vec3::new(0.0, s, s),
        Vec3::new(s, s, s),
        Vec3::new(s, s, 0.0),
        white.clone(),
    );
    quad(
        &mut scene,
        Vec3::new(0.0, 0.0, s),
        Vec3::new(s, 0.0, s),
        Vec3::new(s, s, s),
        Vec3::new(0.0, s, s),
        white,
    );
    // Left green, right red
    quad(
        &mut scene,
        Vec3::new(s, 0.0, 0.0),
        Vec3::new(s, s, 0.0),
        Vec3::new(s, s, s),
        Vec3::new(s, 0.0, s),
        green,
    );
    quad(
        &mut scene,
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, s),
        Vec3::new(0.0, s, s),
        Vec3::new(0.0, s, 0.0),
        red,
    );

    // Ceiling light panel
    scene.add(Box::new(Triangle::new(
        Vec3::new(213.0, 554.0, 227.0),
        Vec3::new(343.0, 554.0, 227.0),
        Vec3::new(343.0, 554.0, 332.0),
        light.clone(),
    )));
    scene.add(Box::new(Triangle::new(
        Vec3::new(213.0, 554.0, 227.0),
        Vec3::new(343.0, 554.0, 332.0),
        Vec3::new(213.0, 554.0, 332.0),
        light,
    )));

    // Glass sphere casting the caustic
    scene.add(Box::new(Sphere::new(
        Vec3::new(190.0, 90.0, 190.0),
        90.0,
        glass,
    )));

    scene.build_bvh(0.0, 1.0);
    scene
}

fn main() -> Result<()> {
    env_logger::init();

    let scene = build_scene();
    let camera = Camera::with_lens(
        Vec3::new(278.0, 278.0, -800.0),
        Vec3::new(278.0, 278.0, 0.0),
        Vec3::Y,
        40.0,
        1.0,
        0.0,
        10.0,
    );

    let config = RenderConfig {
        width: 400,
        height: 400,
        min_samples: 32,
        max_samples: 512,
        batch_size: 16,
        noise_threshold: 0.02,
        scene_id: 2,
        output_dir: Some("render_out".into()),
    };

    // Path traced reference
    let pt = PathIntegrator::new(32);
    let renderer = Renderer::new(&scene, &camera, &pt, config.clone());
    log::info!("rendering with the path tracer");
    renderer.render();

    // Photon mapped version: sharp caustic under the glass sphere
    let pm = PhotonIntegrator::new(
        PhotonMappingConfig {
            photon_count: 5_000_000,
            caustic_radius: 1.0,
            global_radius: 4.0,
            k_nearest: 200,
            final_gather_bound: 5,
            ..Default::default()
        },
        &scene,
    );
    let renderer = Renderer::new(&scene, &camera, &pm, config);
    log::info!("rendering with the photon mapper");
    renderer.render();

    Ok(())
}
